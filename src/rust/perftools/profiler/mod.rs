// Copyright(c) Microsoft Corporation.
// Licensed under the MIT license.

//! This module provides a small scope profiler for the simulation hot paths (operator preparation, stepping and
//! scheduler calls).


//======================================================================================================================
// Imports
//======================================================================================================================

use ::std::{
    cell::RefCell,
    fmt,
    fmt::Debug,
    io,
    rc::Rc,
    time::Instant,
};

//======================================================================================================================
// Thread Local Variables
//======================================================================================================================

thread_local!(
    /// Global thread-local instance of the profiler.
    pub static PROFILER: RefCell<Profiler> = RefCell::new(Profiler::new())
);

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

/// Print profiling scope tree.
///
/// Percentages represent the amount of time taken relative to the parent node. Batch workers each own their
/// thread-local tree, so this only reports scopes entered on the calling thread.
pub fn write<W: io::Write>(out: &mut W, max_depth: Option<usize>) -> io::Result<()> {
    PROFILER.with(|p| p.borrow().write(out, max_depth))
}

/// Reset profiling information.
pub fn reset() {
    PROFILER.with(|p| p.borrow_mut().reset());
}

//======================================================================================================================
// Structures
//======================================================================================================================

/// Internal representation of scopes as a tree.
struct Scope {
    /// Name of the scope.
    name: &'static str,

    /// Parent scope in the tree. Root scopes have no parent.
    pred: Option<Rc<RefCell<Scope>>>,

    /// Child scopes in the tree.
    succs: Vec<Rc<RefCell<Scope>>>,

    /// How often has this scope been visited?
    num_calls: usize,

    /// In total, how many nanoseconds have been spent in this scope?
    duration_sum: u128,
}

/// A guard that is created when entering a scope and dropped when leaving it.
pub struct Guard {
    enter_time: Instant,
}

/// A `Profiler` stores the scope tree and keeps track of the currently active scope.
///
/// There is a global thread-local instance of `Profiler` in [`PROFILER`], so it is not possible to manually create an
/// instance of `Profiler`.
pub struct Profiler {
    roots: Vec<Rc<RefCell<Scope>>>,
    current: Option<Rc<RefCell<Scope>>>,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl Scope {
    fn new(name: &'static str, pred: Option<Rc<RefCell<Scope>>>) -> Scope {
        Scope {
            name,
            pred,
            succs: Vec::new(),
            num_calls: 0,
            duration_sum: 0,
        }
    }

    /// Leave this scope. Called automatically by the `Guard` instance.
    #[inline]
    fn leave(&mut self, duration: u128) {
        self.num_calls += 1;
        self.duration_sum = self.duration_sum.saturating_add(duration);
    }

    fn write_recursive<W: io::Write>(
        &self,
        out: &mut W,
        total_duration: u128,
        depth: usize,
        max_depth: Option<usize>,
    ) -> io::Result<()> {
        if let Some(d) = max_depth {
            if depth > d {
                return Ok(());
            }
        }

        let total_duration_ns: f64 = total_duration as f64;
        let duration_sum_ns: f64 = self.duration_sum as f64;
        let pred_sum_ns: f64 = self
            .pred
            .clone()
            .map_or(total_duration_ns, |pred| pred.borrow().duration_sum as f64);
        let percent: f64 = if pred_sum_ns > 0.0 {
            duration_sum_ns / pred_sum_ns * 100.0
        } else {
            0.0
        };

        let markers: String = "+".repeat(depth + 1);
        writeln!(
            out,
            "{};{};{};{}",
            markers,
            self.name,
            percent,
            duration_sum_ns / (self.num_calls.max(1) as f64),
        )?;

        for succ in &self.succs {
            succ.borrow().write_recursive(out, total_duration, depth + 1, max_depth)?;
        }

        Ok(())
    }
}

impl Guard {
    #[inline]
    fn enter() -> Self {
        Self {
            enter_time: Instant::now(),
        }
    }
}

impl Profiler {
    fn new() -> Profiler {
        Profiler {
            roots: Vec::new(),
            current: None,
        }
    }

    /// Create and enter a synchronous scope. Returns a [`Guard`] that should be dropped upon leaving the scope.
    ///
    /// Usually, this method will be called by the `timer!` macro, so it does not need to be used directly.
    #[inline]
    pub fn sync_scope(&mut self, name: &'static str) -> Guard {
        let scope: Rc<RefCell<Scope>> = self.get_scope(name);
        self.current = Some(scope);
        Guard::enter()
    }

    /// Look up the scope using the name.
    fn get_scope(&mut self, name: &'static str) -> Rc<RefCell<Scope>> {
        if let Some(current) = self.current.as_ref() {
            // We are currently in some scope.
            let existing_succ: Option<Rc<RefCell<Scope>>> = current
                .borrow()
                .succs
                .iter()
                .find(|succ| succ.borrow().name == name)
                .cloned();

            existing_succ.unwrap_or_else(|| {
                let succ: Rc<RefCell<Scope>> = Rc::new(RefCell::new(Scope::new(name, Some(current.clone()))));
                current.borrow_mut().succs.push(succ.clone());
                succ
            })
        } else {
            // We are currently not within any scope.
            let existing_root: Option<Rc<RefCell<Scope>>> =
                self.roots.iter().find(|root| root.borrow().name == name).cloned();

            existing_root.unwrap_or_else(|| {
                let root: Rc<RefCell<Scope>> = Rc::new(RefCell::new(Scope::new(name, None)));
                self.roots.push(root.clone());
                root
            })
        }
    }

    /// Completely reset profiling data.
    fn reset(&mut self) {
        // The current scope is left alone: guards still alive will walk back up to a root and clear it.
        self.roots.clear();
    }

    /// Leave the current scope.
    #[inline]
    fn leave_scope(&mut self, duration: u128) {
        self.current = if let Some(current) = self.current.as_ref() {
            current.borrow_mut().leave(duration);
            current.borrow().pred.as_ref().cloned()
        } else {
            error!("leave_scope(): called while not in any scope");
            None
        };
    }

    fn write<W: io::Write>(&self, out: &mut W, max_depth: Option<usize>) -> io::Result<()> {
        let total_duration: u128 = self.roots.iter().map(|root| root.borrow().duration_sum).sum();

        writeln!(out, "call-depth;function-name;percent-total;ns-per-call")?;
        for root in self.roots.iter() {
            root.borrow().write_recursive(out, total_duration, 0, max_depth)?;
        }

        out.flush()
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Drop for Guard {
    #[inline]
    fn drop(&mut self) {
        let duration: u128 = self.enter_time.elapsed().as_nanos();
        PROFILER.with(|p| p.borrow_mut().leave_scope(duration));
    }
}
