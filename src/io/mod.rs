//! # Diagnostics output
//!
//! The time integrator hands named [`Event`]s to a [`DiagnosticSink`] at
//! fixed points of the step protocol. An event is a bag of key value
//! pairs; sinks decide what to keep and where to put it.
//!
//! | Event            | Keys |
//! |------------------|------|
//! | `initial_state`  | `fdistribu_eq` |
//! | `iteration`      | `iter`, `time_saved`, `fdistribu`, `electrostatic_potential`, `electric_field_x`, moments |
//! | `last_iteration` | same as `iteration` |
//!
//! The moments `mass`, `momentum_vx` (one per velocity dimension),
//! `kinetic_energy` and `electric_energy` are present when the time
//! integrator computes them, see [`crate::moments`]. `fdistribu` is the
//! local block of the process; the binary writes it in the tag order
//! `(species, x, v..)`.
#[cfg(feature = "hdf5")]
pub mod read_write_hdf5;

use crate::error::Result;
use ndarray::prelude::*;
#[cfg(feature = "hdf5")]
use std::path::PathBuf;

/// Name of the event emitted before the first step
pub const INITIAL_STATE: &str = "initial_state";
/// Name of the event emitted at the start of every step
pub const ITERATION: &str = "iteration";
/// Name of the event emitted once after the last step
pub const LAST_ITERATION: &str = "last_iteration";

/// Value attached to an event key
#[derive(Clone, Debug)]
pub enum Value<'a> {
    /// Integer scalar
    Int(i64),
    /// Real scalar
    Float(f64),
    /// Borrowed array (a process local block for distributed fields)
    Array(ArrayViewD<'a, f64>),
}

/// Named collection of diagnostics
#[derive(Clone, Debug)]
pub struct Event<'a> {
    /// Event name
    pub name: &'a str,
    /// Key value pairs in insertion order
    pub entries: Vec<(&'a str, Value<'a>)>,
}

impl<'a> Event<'a> {
    /// Event without entries
    pub fn new(name: &'a str) -> Self {
        Self {
            name,
            entries: Vec::new(),
        }
    }

    /// Add an entry
    #[must_use]
    pub fn with(mut self, key: &'a str, value: Value<'a>) -> Self {
        self.entries.push((key, value));
        self
    }

    /// Value of `key`
    pub fn get(&self, key: &str) -> Option<&Value<'a>> {
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }
}

/// Receiver of diagnostics events
pub trait DiagnosticSink {
    /// Handle one event
    ///
    /// # Errors
    /// Writing the event failed
    fn emit(&mut self, event: &Event<'_>) -> Result<()>;
}

impl DiagnosticSink for Vec<Box<dyn DiagnosticSink>> {
    fn emit(&mut self, event: &Event<'_>) -> Result<()> {
        for sink in self.iter_mut() {
            sink.emit(event)?;
        }
        Ok(())
    }
}

/// Prints a one line summary of every n-th event (rank 0 only)
#[derive(Clone, Debug)]
pub struct LogSink {
    rank: usize,
    every: usize,
    count: usize,
}

impl LogSink {
    /// Print every `every`-th iteration event. `initial_state` and
    /// `last_iteration` are always printed.
    pub fn new(rank: usize, every: usize) -> Self {
        Self {
            rank,
            every: every.max(1),
            count: 0,
        }
    }

    /// Scalars first (`time_saved` as `time`), then the largest absolute
    /// value of every array
    fn summary(event: &Event<'_>) -> String {
        let scalars = event.entries.iter().filter_map(|(key, value)| match value {
            Value::Int(i) => Some(format!("{} = {}", key, i)),
            Value::Float(x) if *key == "time_saved" => Some(format!("time = {:4.2}", x)),
            Value::Float(x) => Some(format!("{} = {:5.3e}", key, x)),
            Value::Array(_) => None,
        });
        let maxima = event.entries.iter().filter_map(|(key, value)| match value {
            Value::Array(a) => {
                let max = a.iter().fold(0., |acc: f64, v| acc.max(v.abs()));
                Some(format!("max |{}| = {:5.3e}", key, max))
            }
            _ => None,
        });
        let mut line = format!("{:<15}", event.name);
        for s in scalars.chain(maxima) {
            line.push_str("    ");
            line.push_str(&s);
        }
        line
    }
}

impl DiagnosticSink for LogSink {
    fn emit(&mut self, event: &Event<'_>) -> Result<()> {
        let show = if event.name == ITERATION {
            self.count += 1;
            (self.count - 1) % self.every == 0
        } else {
            true
        };
        if show && self.rank == 0 {
            println!("{}", Self::summary(event));
        }
        Ok(())
    }
}

/// Owned copy of a [`Value`]
#[derive(Clone, Debug, PartialEq)]
pub enum Recorded {
    /// Integer scalar
    Int(i64),
    /// Real scalar
    Float(f64),
    /// Array
    Array(ArrayD<f64>),
}

/// Owned copy of an [`Event`]
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedEvent {
    /// Event name
    pub name: String,
    /// Key value pairs
    pub entries: Vec<(String, Recorded)>,
}

impl RecordedEvent {
    /// Value of `key`
    pub fn get(&self, key: &str) -> Option<&Recorded> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

/// Keeps copies of all events in memory
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    events: Vec<RecordedEvent>,
}

impl EventLog {
    /// Empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// All events in emission order
    pub fn events(&self) -> &[RecordedEvent] {
        &self.events
    }

    /// Number of events named `name`
    pub fn count(&self, name: &str) -> usize {
        self.events.iter().filter(|e| e.name == name).count()
    }

    /// Most recent event named `name`
    pub fn last(&self, name: &str) -> Option<&RecordedEvent> {
        self.events.iter().rev().find(|e| e.name == name)
    }
}

impl DiagnosticSink for EventLog {
    fn emit(&mut self, event: &Event<'_>) -> Result<()> {
        let entries = event
            .entries
            .iter()
            .map(|(k, v)| {
                let v = match v {
                    Value::Int(i) => Recorded::Int(*i),
                    Value::Float(x) => Recorded::Float(*x),
                    Value::Array(a) => Recorded::Array(a.to_owned()),
                };
                ((*k).to_owned(), v)
            })
            .collect();
        self.events.push(RecordedEvent {
            name: event.name.to_owned(),
            entries,
        });
        Ok(())
    }
}

/// Writes every n-th event into its own hdf5 file
/// `<directory>/<event>_<counter>[_rank<r>].h5`.
///
/// Distributed fields are written as the local block of each process,
/// one file per process when running on more than one.
#[cfg(feature = "hdf5")]
#[derive(Clone, Debug)]
pub struct Hdf5Sink {
    directory: PathBuf,
    rank: usize,
    nprocs: usize,
    every: usize,
    count: usize,
}

#[cfg(feature = "hdf5")]
impl Hdf5Sink {
    /// Sink writing into `directory` (created if missing)
    ///
    /// # Errors
    /// Directory can not be created
    pub fn new<P: Into<PathBuf>>(directory: P, rank: usize, nprocs: usize, every: usize) -> Result<Self> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory)?;
        Ok(Self {
            directory,
            rank,
            nprocs,
            every: every.max(1),
            count: 0,
        })
    }

    fn filename(&self, event: &Event<'_>, counter: usize) -> PathBuf {
        let suffix = if self.nprocs > 1 {
            format!("_rank{}", self.rank)
        } else {
            String::new()
        };
        self.directory
            .join(format!("{}_{:05}{}.h5", event.name, counter, suffix))
    }
}

#[cfg(feature = "hdf5")]
impl DiagnosticSink for Hdf5Sink {
    fn emit(&mut self, event: &Event<'_>) -> Result<()> {
        use read_write_hdf5::{write_scalar_to_hdf5, write_to_hdf5};
        let counter = self.count;
        if event.name == ITERATION {
            self.count += 1;
            if counter % self.every != 0 {
                return Ok(());
            }
        }
        let filename = self.filename(event, counter / self.every);
        for (key, value) in &event.entries {
            match value {
                Value::Int(i) => write_scalar_to_hdf5(&filename, key, *i)?,
                Value::Float(x) => write_scalar_to_hdf5(&filename, key, *x)?,
                Value::Array(a) => write_to_hdf5(&filename, key, a)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_builder() {
        let a = Array1::from(vec![1., -3.]).into_dyn();
        let event = Event::new(ITERATION)
            .with("iter", Value::Int(2))
            .with("fdistribu", Value::Array(a.view()));
        assert_eq!(event.entries.len(), 2);
        assert!(matches!(event.get("iter"), Some(Value::Int(2))));
        assert!(event.get("time_saved").is_none());
        let line = LogSink::summary(&event);
        assert!(line.starts_with("iteration"));
        assert!(line.contains("iter = 2"));
        assert!(line.contains("max |fdistribu| = 3.000e0"));
    }

    #[test]
    fn test_log_line_scalars() {
        let e = Array1::from(vec![0.5, -0.25]).into_dyn();
        let event = Event::new(ITERATION)
            .with("iter", Value::Int(4))
            .with("time_saved", Value::Float(0.5))
            .with("electric_field_x", Value::Array(e.view()))
            .with("mass", Value::Float(12.5))
            .with("kinetic_energy", Value::Float(0.125))
            .with("electric_energy", Value::Float(2e-3));
        let line = LogSink::summary(&event);
        assert_eq!(
            line,
            "iteration          iter = 4    time = 0.50    mass = 1.250e1    \
             kinetic_energy = 1.250e-1    electric_energy = 2.000e-3    max |electric_field_x| = 5.000e-1"
        );
    }

    #[test]
    fn test_event_log() {
        let mut log = EventLog::new();
        let a = Array1::from(vec![1., 2.]).into_dyn();
        for i in 0..3 {
            let event = Event::new(ITERATION)
                .with("iter", Value::Int(i))
                .with("time_saved", Value::Float(0.5 * i as f64));
            log.emit(&event).unwrap();
        }
        log.emit(&Event::new(LAST_ITERATION).with("fdistribu", Value::Array(a.view())))
            .unwrap();
        assert_eq!(log.count(ITERATION), 3);
        assert_eq!(log.count(LAST_ITERATION), 1);
        assert_eq!(log.last(ITERATION).unwrap().get("time_saved"), Some(&Recorded::Float(1.)));
        assert_eq!(log.events()[3].get("fdistribu"), Some(&Recorded::Array(a)));
    }

    #[test]
    fn test_sink_collection() {
        let mut sinks: Vec<Box<dyn DiagnosticSink>> = vec![Box::new(EventLog::new()), Box::new(LogSink::new(1, 10))];
        sinks.emit(&Event::new(INITIAL_STATE)).unwrap();
        let mut log = LogSink::new(0, 2);
        for _ in 0..3 {
            log.emit(&Event::new(ITERATION)).unwrap();
        }
        assert_eq!(log.count, 3);
    }

    #[cfg(feature = "hdf5")]
    #[test]
    fn test_hdf5_sink() {
        let dir = std::env::temp_dir().join(format!("rustvlasov_sink_{}", std::process::id()));
        let mut sink = Hdf5Sink::new(&dir, 0, 1, 1).unwrap();
        let f = Array2::<f64>::ones((2, 3)).into_dyn();
        let event = Event::new(ITERATION)
            .with("iter", Value::Int(0))
            .with("fdistribu", Value::Array(f.view()));
        sink.emit(&event).unwrap();
        let file = dir.join("iteration_00000.h5");
        let g: ArrayD<f64> = read_write_hdf5::read_from_hdf5(&file, "fdistribu").unwrap();
        assert_eq!(g, f);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
