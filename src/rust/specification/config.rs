// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    runtime::fail::{
        Fail,
        FailKind,
    },
    specification::{
        AperiodicTask,
        BoardSpecification,
        CoresSpecification,
        CpuSpecification,
        EnvironmentSpecification,
        GlobalSpecification,
        LeakageModel,
        MaterialCuboid,
        Origin,
        PeriodicTask,
        PowerModel,
        SimulationSpecification,
        TasksSpecification,
    },
};
use ::std::{
    fs,
    ops::Index,
    str::FromStr,
};
use ::yaml_rust::{
    Yaml,
    YamlLoader,
};

//======================================================================================================================
// Constants
//======================================================================================================================

// Task set.
mod tasks_config {
    pub const SECTION_NAME: &str = "tasks";
    pub const PERIODIC: &str = "periodic";
    pub const APERIODIC: &str = "aperiodic";
    pub const CYCLES: &str = "c";
    pub const PERIOD: &str = "t";
    pub const ARRIVAL: &str = "a";
    pub const DEADLINE: &str = "d";
    pub const ENERGY: &str = "energy";
}

// Processor: cores, frequencies and optional geometry.
mod cpu_config {
    pub const SECTION_NAME: &str = "cpu";
    pub const BOARD: &str = "board";
    pub const CORES: &str = "cores";
    pub const PHYSICAL: &str = "physical";
    pub const POWER: &str = "power";
    pub const POWER_MODEL: &str = "model";
    pub const LEAKAGE: &str = "leakage";
    pub const ALPHA: &str = "alpha";
    pub const BETA: &str = "beta";
    pub const DELTA: &str = "delta";
    pub const AVAILABLE_FREQUENCIES: &str = "available_frequencies";
    pub const OPERATING_FREQUENCIES: &str = "operating_frequencies";
    pub const ORIGINS: &str = "origins";
}

// Material cuboids.
mod material_config {
    pub const X: &str = "x";
    pub const Y: &str = "y";
    pub const Z: &str = "z";
    pub const DENSITY: &str = "density";
    pub const SPECIFIC_HEAT: &str = "specific_heat";
    pub const CONDUCTIVITY: &str = "conductivity";
}

// Surroundings of the board.
mod environment_config {
    pub const SECTION_NAME: &str = "environment";
    pub const CONVECTION: &str = "convection";
    pub const TEMPERATURE: &str = "temperature";
    pub const MAX_TEMPERATURE: &str = "max_temperature";
}

// Numerical knobs. The scalar ones may be overridden by upper-cased environment variables.
mod simulation_config {
    pub const SECTION_NAME: &str = "simulation";
    pub const DT: &str = "dt";
    pub const MESH_STEP: &str = "mesh_step";
    pub const SIMULATE_THERMAL: &str = "simulate_thermal";
    pub const TASKS_FRAGMENTATION: &str = "tasks_fragmentation";
    pub const THERMAL_FRAGMENTATION: &str = "thermal_fragmentation";
    pub const INTEGRATOR: &str = "integrator";
    pub const OPERATOR_CACHE_CAPACITY: &str = "operator_cache_capacity";
    pub const RECORD_TEMPERATURE_MAP: &str = "record_temperature_map";
    pub const DECIMALS: &str = "decimals";
}

//======================================================================================================================
// Structures
//======================================================================================================================

/// Problem specification read from a YAML document.
#[derive(Clone, Debug)]
pub struct Config(pub Yaml);

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl Config {
    /// Reads a configuration file into a [Config] object.
    pub fn new(config_path: &str) -> Result<Self, Fail> {
        let config_s: String = fs::read_to_string(config_path)?;
        Self::from_str(&config_s)
    }

    /// Builds the whole problem specification.
    pub fn global_specification(&self) -> Result<GlobalSpecification, Fail> {
        Ok(GlobalSpecification::new(
            self.tasks()?,
            self.cpu()?,
            self.environment()?,
            self.simulation()?,
        ))
    }

    /// Reads the task set.
    pub fn tasks(&self) -> Result<TasksSpecification, Fail> {
        let section: &Yaml = Self::get_subsection(&self.0, tasks_config::SECTION_NAME)?;
        let mut periodic_tasks: Vec<PeriodicTask> = Vec::new();
        for task in Self::get_optional_array(section, tasks_config::PERIODIC)? {
            periodic_tasks.push(PeriodicTask {
                c: Self::get_number_option(task, tasks_config::CYCLES)?,
                t: Self::get_number_option(task, tasks_config::PERIOD)?,
                d: Self::get_number_option(task, tasks_config::DEADLINE)?,
                energy: Self::get_optional_number(task, tasks_config::ENERGY)?,
            });
        }
        let mut aperiodic_tasks: Vec<AperiodicTask> = Vec::new();
        for task in Self::get_optional_array(section, tasks_config::APERIODIC)? {
            aperiodic_tasks.push(AperiodicTask {
                c: Self::get_number_option(task, tasks_config::CYCLES)?,
                a: Self::get_number_option(task, tasks_config::ARRIVAL)?,
                d: Self::get_number_option(task, tasks_config::DEADLINE)?,
                energy: Self::get_optional_number(task, tasks_config::ENERGY)?,
            });
        }
        Ok(TasksSpecification::new(periodic_tasks, aperiodic_tasks))
    }

    /// Reads the processor description.
    pub fn cpu(&self) -> Result<CpuSpecification, Fail> {
        let section: &Yaml = Self::get_subsection(&self.0, cpu_config::SECTION_NAME)?;
        let board: Option<BoardSpecification> = match Self::get_optional_subsection(section, cpu_config::BOARD)? {
            Some(board) => Some(BoardSpecification {
                physical: Self::get_material(board)?,
            }),
            None => None,
        };

        let cores_section: &Yaml = Self::get_subsection(section, cpu_config::CORES)?;
        let mut cores: CoresSpecification = CoresSpecification::new(
            Self::get_number_array(cores_section, cpu_config::AVAILABLE_FREQUENCIES)?,
            Self::get_number_array(cores_section, cpu_config::OPERATING_FREQUENCIES)?,
        );
        if let Some(physical) = Self::get_optional_subsection(cores_section, cpu_config::PHYSICAL)? {
            cores.physical = Some(Self::get_material(physical)?);
        }
        if let Some(power) = Self::get_optional_subsection(cores_section, cpu_config::POWER)? {
            cores.power = Some(Self::get_power_model(power)?);
        }
        if let Some(leakage) = Self::get_optional_subsection(cores_section, cpu_config::LEAKAGE)? {
            cores.leakage = Some(LeakageModel {
                alpha: Self::get_number_option(leakage, cpu_config::ALPHA)?,
                delta: Self::get_number_option(leakage, cpu_config::DELTA)?,
            });
        }
        if Self::has_option(cores_section, cpu_config::ORIGINS) {
            let mut origins: Vec<Origin> = Vec::new();
            for origin in Self::get_optional_array(cores_section, cpu_config::ORIGINS)? {
                origins.push(Origin {
                    x: Self::get_number_option(origin, material_config::X)?,
                    y: Self::get_number_option(origin, material_config::Y)?,
                });
            }
            cores.origins = Some(origins);
        }
        Ok(CpuSpecification::new(board, cores))
    }

    /// Reads the optional environment section.
    pub fn environment(&self) -> Result<Option<EnvironmentSpecification>, Fail> {
        match Self::get_optional_subsection(&self.0, environment_config::SECTION_NAME)? {
            Some(section) => Ok(Some(EnvironmentSpecification::new(
                Self::get_number_option(section, environment_config::CONVECTION)?,
                Self::get_number_option(section, environment_config::TEMPERATURE)?,
                Self::get_number_option(section, environment_config::MAX_TEMPERATURE)?,
            ))),
            None => Ok(None),
        }
    }

    /// Reads the simulation knobs. `dt`, `simulate_thermal`, `tasks_fragmentation` and `thermal_fragmentation` are
    /// read from the environment variable of the same name (upper-cased) first.
    pub fn simulation(&self) -> Result<SimulationSpecification, Fail> {
        let section: &Yaml = Self::get_subsection(&self.0, simulation_config::SECTION_NAME)?;

        let dt: f64 = match Self::get_typed_env_option(simulation_config::DT)? {
            Some(dt) => dt,
            None => Self::get_number_option(section, simulation_config::DT)?,
        };
        let mut simulation: SimulationSpecification = SimulationSpecification::new(dt);
        simulation.mesh_step = Self::get_optional_number(section, simulation_config::MESH_STEP)?;

        simulation.simulate_thermal = match Self::get_typed_env_option(simulation_config::SIMULATE_THERMAL)? {
            Some(enabled) => enabled,
            None if Self::has_option(section, simulation_config::SIMULATE_THERMAL) => {
                Self::get_bool_option(section, simulation_config::SIMULATE_THERMAL)?
            },
            None => false,
        };
        if let Some(fragmentation) = Self::get_env_or_int_option(section, simulation_config::TASKS_FRAGMENTATION)? {
            simulation.tasks_fragmentation = fragmentation;
        }
        if let Some(fragmentation) = Self::get_env_or_int_option(section, simulation_config::THERMAL_FRAGMENTATION)? {
            simulation.thermal_fragmentation = fragmentation;
        }
        if Self::has_option(section, simulation_config::INTEGRATOR) {
            simulation.integrator =
                Self::get_typed_str_option(section, simulation_config::INTEGRATOR, |s: &str| s.parse().ok())?;
        }
        if Self::has_option(section, simulation_config::OPERATOR_CACHE_CAPACITY) {
            simulation.operator_cache_capacity =
                Self::get_int_option(section, simulation_config::OPERATOR_CACHE_CAPACITY)?;
        }
        if Self::has_option(section, simulation_config::RECORD_TEMPERATURE_MAP) {
            simulation.record_temperature_map =
                Self::get_bool_option(section, simulation_config::RECORD_TEMPERATURE_MAP)?;
        }
        if Self::has_option(section, simulation_config::DECIMALS) {
            simulation.decimals = Self::get_int_option(section, simulation_config::DECIMALS)?;
        }
        Ok(simulation)
    }

    //==================================================================================================================
    // Static Functions
    //==================================================================================================================

    fn get_material(yaml: &Yaml) -> Result<MaterialCuboid, Fail> {
        Ok(MaterialCuboid {
            x: Self::get_number_option(yaml, material_config::X)?,
            y: Self::get_number_option(yaml, material_config::Y)?,
            z: Self::get_number_option(yaml, material_config::Z)?,
            density: Self::get_number_option(yaml, material_config::DENSITY)?,
            specific_heat: Self::get_number_option(yaml, material_config::SPECIFIC_HEAT)?,
            conductivity: Self::get_number_option(yaml, material_config::CONDUCTIVITY)?,
        })
    }

    fn get_power_model(yaml: &Yaml) -> Result<PowerModel, Fail> {
        let model: String = Self::get_typed_str_option(yaml, cpu_config::POWER_MODEL, |s: &str| Some(s.to_string()))?;
        match model.as_str() {
            "energy" => Ok(PowerModel::Energy),
            "frequency" => Ok(PowerModel::Frequency {
                alpha: Self::get_number_option(yaml, cpu_config::ALPHA)?,
                beta: Self::get_number_option(yaml, cpu_config::BETA)?,
            }),
            other => Err(Self::bad_option(&format!("unknown power model \"{}\"", other))),
        }
    }

    /// Similar to `get_typed_option` using `Yaml::as_hash` receiver. This method returns a `&Yaml` instead of
    /// yaml::Hash, and Yaml is more natural for indexing.
    fn get_subsection<'a>(yaml: &'a Yaml, index: &str) -> Result<&'a Yaml, Fail> {
        let section: &'a Yaml = Self::get_option(yaml, index)?;
        match section {
            Yaml::Hash(_) => Ok(section),
            _ => Err(Self::bad_option(&format!("parameter \"{}\" has unexpected type", index))),
        }
    }

    /// Same as `get_subsection`, but a missing section is not an error.
    fn get_optional_subsection<'a>(yaml: &'a Yaml, index: &str) -> Result<Option<&'a Yaml>, Fail> {
        if Self::has_option(yaml, index) {
            Ok(Some(Self::get_subsection(yaml, index)?))
        } else {
            Ok(None)
        }
    }

    fn has_option(yaml: &Yaml, index: &str) -> bool {
        !matches!(yaml.index(index), Yaml::BadValue | Yaml::Null)
    }

    /// Index `yaml` to find the value at `index`, validating that the index exists.
    fn get_option<'a>(yaml: &'a Yaml, index: &str) -> Result<&'a Yaml, Fail> {
        match yaml.index(index) {
            Yaml::BadValue => Err(Self::bad_option(&format!("missing configuration option \"{}\"", index))),
            value => Ok(value),
        }
    }

    /// Index `yaml` to find the value at `index`, validating that it exists and that the receiver returns Some(_).
    fn get_typed_option<'a, T, Fn>(yaml: &'a Yaml, index: &str, receiver: Fn) -> Result<T, Fail>
    where
        Fn: FnOnce(&'a Yaml) -> Option<T>,
    {
        let option: &'a Yaml = Self::get_option(yaml, index)?;
        match receiver(option) {
            Some(value) => Ok(value),
            None => Err(Self::bad_option(&format!("parameter {} has unexpected type", index))),
        }
    }

    /// Index `yaml` to find value at `index`, validating it as a string.
    fn get_typed_str_option<T, Fn>(yaml: &Yaml, index: &str, parser: Fn) -> Result<T, Fail>
    where
        Fn: FnOnce(&str) -> Option<T>,
    {
        let option: &Yaml = Self::get_option(yaml, index)?;
        if let Some(value) = option.as_str() {
            if let Some(value) = parser(value) {
                return Ok(value);
            }
        }
        Err(Self::bad_option(&format!("parameter {} has unexpected type", index)))
    }

    /// Get value where the environment value overrides the config file if it exists.
    fn get_typed_env_option<T: FromStr>(index: &str) -> Result<Option<T>, Fail> {
        // Check for the environment variable.
        if let Ok(var) = ::std::env::var(index.to_uppercase()) {
            if let Ok(value) = var.as_str().parse() {
                return Ok(Some(value));
            } else {
                return Err(Self::bad_option(&format!("parameter {} has unexpected type", index)));
            }
        }
        Ok(None)
    }

    /// Reads an optional integer, letting the environment override the file.
    fn get_env_or_int_option(yaml: &Yaml, index: &str) -> Result<Option<usize>, Fail> {
        if let Some(value) = Self::get_typed_env_option(index)? {
            return Ok(Some(value));
        }
        if Self::has_option(yaml, index) {
            return Ok(Some(Self::get_int_option(yaml, index)?));
        }
        Ok(None)
    }

    /// Similar to `get_typed_option` using `Yaml::as_i64` as the receiver, but additionally verifies that the
    /// destination type may hold the i64 value.
    fn get_int_option<T: TryFrom<i64>>(yaml: &Yaml, index: &str) -> Result<T, Fail> {
        let val: i64 = Self::get_typed_option(yaml, index, &Yaml::as_i64)?;
        match T::try_from(val) {
            Ok(val) => Ok(val),
            _ => Err(Self::bad_option(&format!("parameter \"{}\" is out of range", index))),
        }
    }

    /// Same as `get_typed_option` using `Yaml::as_bool` as the receiver.
    fn get_bool_option(yaml: &Yaml, index: &str) -> Result<bool, Fail> {
        Self::get_typed_option(yaml, index, &Yaml::as_bool)
    }

    /// Reads a number written either as an integer or as a real.
    fn get_number_option(yaml: &Yaml, index: &str) -> Result<f64, Fail> {
        Self::get_typed_option(yaml, index, as_number)
    }

    fn get_optional_number(yaml: &Yaml, index: &str) -> Result<Option<f64>, Fail> {
        if Self::has_option(yaml, index) {
            Ok(Some(Self::get_number_option(yaml, index)?))
        } else {
            Ok(None)
        }
    }

    fn get_number_array(yaml: &Yaml, index: &str) -> Result<Vec<f64>, Fail> {
        let array: &Vec<Yaml> = Self::get_typed_option(yaml, index, &Yaml::as_vec)?;
        array
            .iter()
            .map(|item: &Yaml| match as_number(item) {
                Some(value) => Ok(value),
                None => Err(Self::bad_option(&format!("parameter {} holds a non-numeric item", index))),
            })
            .collect()
    }

    /// Reads an optional list. A missing list is empty.
    fn get_optional_array<'a>(yaml: &'a Yaml, index: &str) -> Result<&'a [Yaml], Fail> {
        if Self::has_option(yaml, index) {
            Ok(Self::get_typed_option(yaml, index, &Yaml::as_vec)?.as_slice())
        } else {
            Ok(&[])
        }
    }

    fn bad_option(cause: &str) -> Fail {
        error!("config: {}", cause);
        Fail::new(FailKind::InvalidConfig, cause)
    }
}

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

fn as_number(yaml: &Yaml) -> Option<f64> {
    match yaml {
        Yaml::Integer(value) => Some(*value as f64),
        Yaml::Real(_) => yaml.as_f64(),
        _ => None,
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl FromStr for Config {
    type Err = Fail;

    /// Parses a single YAML document.
    fn from_str(config_s: &str) -> Result<Self, Fail> {
        let config: Vec<Yaml> = match YamlLoader::load_from_str(config_s) {
            Ok(config) => config,
            Err(e) => return Err(Self::bad_option(&format!("malformed YAML ({})", e))),
        };
        match &config[..] {
            [c] => Ok(Self(c.clone())),
            _ => Err(Self::bad_option("wrong number of config objects")),
        }
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
