//! Read/write the JSON artifacts shared between `generate` and `fit`.
//!
//! - `<dir>/<project>_frac_folded_dict.json`: `<construct>_frac_folded` → expression
//! - `<dir>/<project>_constructs.json`: construct names the equations were built for
//! - guesses files: either `{ "dGN": 5.0, ... }` or a list of parameter records

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::domain::{Construct, Parameters, unique_constructs};
use crate::error::{IsingError, Result};
use crate::models::Equations;

/// `<dir>/<project>_frac_folded_dict.json`
pub fn equations_path(dir: &Path, project: &str) -> PathBuf {
    dir.join(format!("{project}_frac_folded_dict.json"))
}

/// `<dir>/<project>_constructs.json`
pub fn constructs_path(dir: &Path, project: &str) -> PathBuf {
    dir.join(format!("{project}_constructs.json"))
}

fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| IsingError::io(parent, e))?;
    }
    let file = File::create(path).map_err(|e| IsingError::io(path, e))?;
    serde_json::to_writer_pretty(file, value).map_err(|e| IsingError::io(path, e))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| IsingError::io(path, e))?;
    serde_json::from_reader(file).map_err(|e| IsingError::io(path, format!("invalid JSON: {e}")))
}

/// Write the fraction-folded map; returns the file written.
pub fn write_fitting_equations(dir: &Path, project: &str, equations: &Equations) -> Result<PathBuf> {
    let path = equations_path(dir, project);
    write_json(&path, equations)?;
    tracing::info!(path = %path.display(), equations = equations.len(), "wrote fitting equations");
    Ok(path)
}

pub fn read_fitting_equations(path: &Path) -> Result<Equations> {
    read_json(path)
}

/// Write the construct list; returns the file written.
pub fn write_construct_names(dir: &Path, project: &str, constructs: &[Construct]) -> Result<PathBuf> {
    let path = constructs_path(dir, project);
    let names: Vec<&str> = constructs.iter().map(Construct::name).collect();
    write_json(&path, &names)?;
    Ok(path)
}

pub fn read_construct_names(path: &Path) -> Result<Vec<Construct>> {
    let names: Vec<String> = read_json(path)?;
    unique_constructs(&names)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GuessesFile {
    List(Parameters),
    Map(BTreeMap<String, f64>),
}

/// Load initial guesses. Map entries are all varying.
pub fn read_guesses(path: &Path) -> Result<Parameters> {
    let parsed: GuessesFile = read_json(path)
        .map_err(|e| IsingError::InvalidGuesses(format!("cannot load '{}': {e}", path.display())))?;
    let params = match parsed {
        GuessesFile::List(params) => params,
        GuessesFile::Map(map) => {
            let mut params = Parameters::new();
            for (name, value) in map {
                params.add(name, value);
            }
            params
        }
    };
    params.validate()?;
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::generate_fitting_equations;

    #[test]
    fn equations_round_trip_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let constructs = unique_constructs(&["N_R_C", "R_R"]).unwrap();
        let eqs = generate_fitting_equations(&constructs).unwrap();

        let path = write_fitting_equations(dir.path(), "nrc", &eqs).unwrap();
        assert!(path.ends_with("nrc_frac_folded_dict.json"));
        assert_eq!(read_fitting_equations(&path).unwrap(), eqs);
    }

    #[test]
    fn output_directory_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("out").join("eq");
        let constructs = unique_constructs(&["R"]).unwrap();
        let path = write_construct_names(&nested, "p", &constructs).unwrap();
        let back = read_construct_names(&path).unwrap();
        assert_eq!(back, constructs);
    }

    #[test]
    fn guesses_accept_map_and_list_forms() {
        let dir = tempfile::tempdir().unwrap();
        let map = dir.path().join("map.json");
        fs::write(&map, r#"{"dGN": 5.0, "mi": 1.2}"#).unwrap();
        let p = read_guesses(&map).unwrap();
        assert_eq!(p.value("mi"), Some(1.2));
        assert!(p.get("dGN").unwrap().vary);

        let list = dir.path().join("list.json");
        fs::write(&list, r#"[{"name": "dGinter", "value": -10.0, "vary": false}]"#).unwrap();
        let p = read_guesses(&list).unwrap();
        assert!(!p.get("dGinter").unwrap().vary);

        let bad = dir.path().join("bad.json");
        fs::write(&bad, r#"{"dGN": "five"}"#).unwrap();
        assert!(matches!(read_guesses(&bad), Err(IsingError::InvalidGuesses(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_fitting_equations(&dir.path().join("nope.json")),
            Err(IsingError::Io { .. })
        ));
    }
}
