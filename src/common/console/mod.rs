// Copyright © 2018 Cormac O'Brien
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of this software
// and associated documentation files (the "Software"), to deal in the Software without
// restriction, including without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all copies or
// substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING
// BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
// DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! Console variables.

use std::{cell::RefCell, collections::HashMap};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("Could not parse cvar as a number: {name} = \"{value}\"")]
    CvarParseFailed { name: String, value: String },
    #[error("Cvar already registered: {0}")]
    DuplicateCvar(String),
    #[error("No such cvar: {0}")]
    NoSuchCvar(String),
}

/// A configuration variable.
///
/// Cvars are the primary method of tuning the simulation.
struct Cvar {
    // Value of this variable
    val: String,

    // If true, this variable should be archived in vars.rc
    archive: bool,

    // The default value of this variable
    default: String,
}

pub struct CvarRegistry {
    cvars: RefCell<HashMap<String, Cvar>>,
}

impl CvarRegistry {
    /// Construct a new empty `CvarRegistry`.
    pub fn new() -> CvarRegistry {
        CvarRegistry {
            cvars: RefCell::new(HashMap::new()),
        }
    }

    fn register_impl<S>(&self, name: S, default: S, archive: bool) -> Result<(), ConsoleError>
    where
        S: AsRef<str>,
    {
        let name = name.as_ref();
        let default = default.as_ref();

        let mut cvars = self.cvars.borrow_mut();
        match cvars.get(name) {
            Some(_) => Err(ConsoleError::DuplicateCvar(name.to_owned()))?,
            None => {
                cvars.insert(
                    name.to_owned(),
                    Cvar {
                        val: default.to_owned(),
                        archive,
                        default: default.to_owned(),
                    },
                );
            }
        }

        Ok(())
    }

    /// Register a new `Cvar` with the given name.
    pub fn register<S>(&self, name: S, default: S) -> Result<(), ConsoleError>
    where
        S: AsRef<str>,
    {
        self.register_impl(name, default, false)
    }

    /// Register a new archived `Cvar` with the given name.
    ///
    /// The value of this `Cvar` should be written to `vars.rc` whenever the game is closed.
    pub fn register_archive<S>(&self, name: S, default: S) -> Result<(), ConsoleError>
    where
        S: AsRef<str>,
    {
        self.register_impl(name, default, true)
    }

    pub fn get<S>(&self, name: S) -> Result<String, ConsoleError>
    where
        S: AsRef<str>,
    {
        Ok(self
            .cvars
            .borrow()
            .get(name.as_ref())
            .ok_or(ConsoleError::NoSuchCvar(name.as_ref().to_owned()))?
            .val
            .clone())
    }

    /// Returns the value of the named cvar as a number.
    ///
    /// A value that doesn't parse is reset to the cvar's default.
    pub fn get_value<S>(&self, name: S) -> Result<f32, ConsoleError>
    where
        S: AsRef<str>,
    {
        let name = name.as_ref();
        let mut cvars = self.cvars.borrow_mut();
        let cvar = cvars
            .get_mut(name)
            .ok_or(ConsoleError::NoSuchCvar(name.to_owned()))?;

        // try parsing as f32
        let val_string = cvar.val.clone();
        let val = match val_string.parse::<f32>() {
            Ok(v) => Ok(v),
            // if parse fails, reset to default value and try again
            Err(_) => {
                warn!(
                    "cvar {} = \"{}\" is not a number, resetting to {}",
                    name, val_string, cvar.default
                );
                cvar.val = cvar.default.clone();
                cvar.val.parse::<f32>()
            }
        }
        .or(Err(ConsoleError::CvarParseFailed {
            name: name.to_owned(),
            value: val_string.clone(),
        }))?;

        Ok(val)
    }

    pub fn set<S>(&self, name: S, value: S) -> Result<(), ConsoleError>
    where
        S: AsRef<str>,
    {
        trace!("cvar assignment: {} {}", name.as_ref(), value.as_ref());
        let mut cvars = self.cvars.borrow_mut();
        let cvar = cvars
            .get_mut(name.as_ref())
            .ok_or(ConsoleError::NoSuchCvar(name.as_ref().to_owned()))?;
        cvar.val = value.as_ref().to_owned();

        Ok(())
    }

    pub fn contains<S>(&self, name: S) -> bool
    where
        S: AsRef<str>,
    {
        self.cvars.borrow().contains_key(name.as_ref())
    }

    /// Returns `name value` lines for every archived cvar, sorted by name.
    pub fn archive_lines(&self) -> Vec<String> {
        let mut lines = self
            .cvars
            .borrow()
            .iter()
            .filter(|(_, cvar)| cvar.archive)
            .map(|(name, cvar)| format!("{} \"{}\"", name, cvar.val))
            .collect::<Vec<_>>();
        lines.sort();
        lines
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_register_and_get() {
        let cvars = CvarRegistry::new();
        cvars.register("sv_gravity", "800").unwrap();
        assert!(cvars.contains("sv_gravity"));
        assert_eq!(cvars.get("sv_gravity").unwrap(), "800");
        assert_eq!(cvars.get_value("sv_gravity").unwrap(), 800.0);
    }

    #[test]
    fn test_duplicate_cvar() {
        let cvars = CvarRegistry::new();
        cvars.register("sv_friction", "4").unwrap();
        assert!(matches!(
            cvars.register("sv_friction", "6"),
            Err(ConsoleError::DuplicateCvar(_))
        ));
    }

    #[test]
    fn test_unparseable_value_resets_to_default() {
        let cvars = CvarRegistry::new();
        cvars.register("sv_maxspeed", "320").unwrap();
        cvars.set("sv_maxspeed", "fast").unwrap();
        assert_eq!(cvars.get_value("sv_maxspeed").unwrap(), 320.0);
        assert_eq!(cvars.get("sv_maxspeed").unwrap(), "320");
    }

    #[test]
    fn test_no_such_cvar() {
        let cvars = CvarRegistry::new();
        assert!(matches!(
            cvars.get_value("sv_nothing"),
            Err(ConsoleError::NoSuchCvar(_))
        ));
        assert!(cvars.set("sv_nothing", "1").is_err());
    }

    #[test]
    fn test_archive_lines() {
        let cvars = CvarRegistry::new();
        cvars.register_archive("b", "2").unwrap();
        cvars.register_archive("a", "1").unwrap();
        cvars.register("c", "3").unwrap();
        assert_eq!(cvars.archive_lines(), vec!["a \"1\"", "b \"2\""]);
    }
}
