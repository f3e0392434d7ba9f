//! Migration filename parser
//!
//! A migration filename is a numeric ID, a free-text description, any
//! combination of direction / no-transaction markers and finally the
//! configured extension:
//!
//! ```text
//! 0002_add_users.notx.back.sql
//! ^^^^                          ID ("0002", 2)
//!     ^^^^^^^^^^                description ("_add_users")
//!               ^^^^^^^^^^      markers, in any order
//!                         ^^^^  extension
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::FilenameConfig;
use crate::error::FilenameError;

/// Which half of a migration pair a file represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Backward,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => write!(f, "forward"),
            Direction::Backward => write!(f, "backward"),
        }
    }
}

/// Identity and behaviour extracted from a single migration filename
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedFilename {
    pub id: u64,
    /// The ID as written in the filename, leading zeros included
    pub id_str: String,
    pub description: String,
    pub direction: Direction,
    pub no_tx: bool,
}

#[derive(Clone, Copy)]
enum Marker {
    Direction(Direction),
    NoTx,
}

/// Parse `filename` according to the markers in `config`.
///
/// ID 0 is accepted here; the loader rejects it when validating the set.
pub fn parse_filename(
    filename: &str,
    config: &FilenameConfig,
) -> Result<ParsedFilename, FilenameError> {
    let digits = filename.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return Err(FilenameError::MissingIdPrefix);
    }
    let (id_str, rest) = filename.split_at(digits);

    let id = id_str
        .parse::<u64>()
        .map_err(|e| FilenameError::InvalidId(e.to_string()))?;

    let mut rest = rest
        .strip_suffix(config.extension.as_str())
        .ok_or_else(|| FilenameError::MissingExtension(config.extension.clone()))?;

    let markers = [
        (config.forward.as_str(), Marker::Direction(Direction::Forward)),
        (config.backward.as_str(), Marker::Direction(Direction::Backward)),
        (config.no_tx.as_str(), Marker::NoTx),
    ];

    let mut direction = None;
    let mut no_tx = false;

    // Strip markers off the end until none of them matches.
    'strip: loop {
        for (suffix, marker) in markers {
            if suffix.is_empty() {
                continue;
            }
            let Some(stripped) = rest.strip_suffix(suffix) else {
                continue;
            };
            rest = stripped;

            match marker {
                Marker::Direction(d) => {
                    if direction.is_some() {
                        return Err(FilenameError::AmbiguousDirection {
                            forward: config.forward.clone(),
                            backward: config.backward.clone(),
                        });
                    }
                    direction = Some(d);
                }
                Marker::NoTx => {
                    if no_tx {
                        return Err(FilenameError::DuplicateNoTxSuffix(config.no_tx.clone()));
                    }
                    no_tx = true;
                }
            }
            continue 'strip;
        }
        break;
    }

    let direction = match direction {
        Some(direction) => direction,
        None => implied_direction(config)?,
    };

    Ok(ParsedFilename {
        id,
        id_str: id_str.to_string(),
        description: rest.to_string(),
        direction,
        no_tx,
    })
}

/// Direction of a file that carries no direction marker.
fn implied_direction(config: &FilenameConfig) -> Result<Direction, FilenameError> {
    match (config.forward.is_empty(), config.backward.is_empty()) {
        (false, false) => Err(FilenameError::MissingDirectionMarker {
            forward: config.forward.clone(),
            backward: config.backward.clone(),
        }),
        (true, _) => Ok(Direction::Forward),
        (false, true) => Ok(Direction::Backward),
    }
}
