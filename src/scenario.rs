//! Beach description supplied by the user before generation.

use std::{
    fs,
    io::{BufRead, Write},
    path::Path,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identity and center point of a beach. Doubles as the summary record the
/// store keeps for listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeachInfo {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

pub const EXAMPLE_INPUT: &str = r#"{
  "_id": "beachid444987",
  "name": "black orange",
  "lat": 12.35678,
  "lon": 77.13456
}"#;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to read beach description: {0}")]
    Io(#[from] std::io::Error),
    #[error("input ended before a valid beach description was entered")]
    Exhausted,
}

impl BeachInfo {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read beach file {}", path.display()))?;
        serde_json::from_str(&data).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Default output file name for this beach's generated document.
    pub fn output_file_name(&self) -> String {
        format!("{}_data.json", self.id)
    }
}

/// Prompts on `output` and reads JSON blocks from `input`, each terminated
/// by a blank line, until one parses into a [`BeachInfo`].
pub fn read_beach_info<R: BufRead, W: Write>(mut input: R, mut output: W) -> Result<BeachInfo, InputError> {
    writeln!(
        output,
        "Please paste the beach information in JSON format and press Enter twice."
    )?;
    writeln!(output, "Example:\n{EXAMPLE_INPUT}\n{}", "-".repeat(20))?;

    loop {
        let Some(block) = read_block(&mut input)? else {
            return Err(InputError::Exhausted);
        };
        if block.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<BeachInfo>(&block) {
            Ok(info) => return Ok(info),
            Err(err) if err.is_data() => writeln!(
                output,
                "Invalid JSON: Missing one of the required keys (_id, name, lat, lon). Please try again."
            )?,
            Err(_) => writeln!(
                output,
                "Invalid JSON format. Please paste the JSON object correctly."
            )?,
        }
    }
}

/// Lines up to the next blank line; `None` once input is exhausted.
fn read_block<R: BufRead>(input: &mut R) -> Result<Option<String>, std::io::Error> {
    let mut block = String::new();
    let mut saw_line = false;
    loop {
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(saw_line.then_some(block));
        }
        saw_line = true;
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return Ok(Some(block));
        }
        block.push_str(line);
    }
}
