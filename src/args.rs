//! Argument normalization
//!
//! Every entry adapter hands the bootstrapper the same thing: a narrow,
//! UTF-8 (or raw-byte on Unix) argument vector that can also be exposed as a
//! C-style `argv` terminated by a null pointer. Windows delivers UTF-16
//! arguments, everything else delivers bytes.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use thiserror::Error;

/// Failure to convert a native argument vector
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgsError {
    /// A UTF-16 argument contained a surrogate with no partner
    #[error("argument {index} contains an unpaired surrogate 0x{unit:04x}")]
    UnpairedSurrogate { index: usize, unit: u16 },

    /// A narrow argument contained a NUL byte before its end
    #[error("argument {index} contains an interior NUL byte")]
    InteriorNul { index: usize },
}

impl ArgsError {
    /// Index of the argument that failed to convert
    pub fn index(&self) -> usize {
        match self {
            ArgsError::UnpairedSurrogate { index, .. } | ArgsError::InteriorNul { index } => *index,
        }
    }
}

/// An immutable, normalized argument vector
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NormalizedArgs {
    entries: Vec<CString>,
}

impl NormalizedArgs {
    /// Convert UTF-16 arguments (as received by a wide-character entry point).
    ///
    /// Each entry is read up to its first NUL unit, mirroring how a native
    /// wide string is terminated.
    pub fn from_wide<I, S>(wide: I) -> Result<Self, ArgsError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u16]>,
    {
        let mut entries = Vec::new();
        for (index, arg) in wide.into_iter().enumerate() {
            let units = arg.as_ref();
            let end = units.iter().position(|&u| u == 0).unwrap_or(units.len());

            let mut utf8 = String::with_capacity(end);
            for decoded in char::decode_utf16(units[..end].iter().copied()) {
                match decoded {
                    Ok(c) => utf8.push(c),
                    Err(err) => {
                        return Err(ArgsError::UnpairedSurrogate {
                            index,
                            unit: err.unpaired_surrogate(),
                        })
                    }
                }
            }

            let entry = CString::new(utf8).map_err(|_| ArgsError::InteriorNul { index })?;
            entries.push(entry);
        }
        Ok(Self { entries })
    }

    /// Take narrow arguments through unchanged
    pub fn from_bytes<I, S>(raw: I) -> Result<Self, ArgsError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        let entries = raw
            .into_iter()
            .enumerate()
            .map(|(index, arg)| {
                CString::new(arg.as_ref()).map_err(|_| ArgsError::InteriorNul { index })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    /// Number of arguments (the sentinel is not counted)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CStr> {
        self.entries.iter().map(|e| e.as_c_str())
    }

    /// Program name, if the vector has one
    pub fn program(&self) -> Option<&CStr> {
        self.entries.first().map(|e| e.as_c_str())
    }

    /// Arguments as owned strings; invalid UTF-8 (Unix only) is replaced
    pub fn to_strings(&self) -> Vec<String> {
        self.iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    /// A C `argv`: one pointer per argument followed by a null sentinel.
    ///
    /// The pointers borrow from `self` and are valid as long as it lives.
    pub fn argv(&self) -> Vec<*const c_char> {
        self.entries
            .iter()
            .map(|e| e.as_ptr())
            .chain(std::iter::once(std::ptr::null()))
            .collect()
    }
}
