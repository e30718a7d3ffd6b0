// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! `cti_be_daemon` CLI argument grammar (spec.md §6).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("missing required argument --{0}")]
    MissingRequired(&'static str),
    #[error("invalid value for --{0}: {1}")]
    InvalidValue(&'static str, String),
    #[error("unrecognized argument: {0}")]
    Unrecognized(String),
}

/// Parsed form of the `cti_be_daemon` argument vector.
#[derive(Debug, Clone)]
pub struct Args {
    pub apid: String,
    pub wlm: u8,
    pub path: std::path::PathBuf,
    pub directory: String,
    pub inst: u32,
    pub manifest: Option<String>,
    pub binary: Option<String>,
    pub env: Vec<(String, String)>,
    pub apath: Option<std::path::PathBuf>,
    pub ldlibrarypath: Option<String>,
    pub clean: bool,
    pub debug: bool,
    pub trailing_args: Vec<String>,
}

/// Parse `argv` (excluding `argv[0]`) into [`Args`].
pub fn parse(argv: &[String]) -> Result<Args, CliError> {
    let mut apid = None;
    let mut wlm = None;
    let mut path = None;
    let mut directory = None;
    let mut inst = None;
    let mut manifest = None;
    let mut binary = None;
    let mut env = Vec::new();
    let mut apath = None;
    let mut ldlibrarypath = None;
    let mut clean = false;
    let mut debug = false;
    let mut trailing_args = Vec::new();

    let mut iter = argv.iter();
    while let Some(arg) = iter.next() {
        if arg == "--" {
            trailing_args.extend(iter.by_ref().cloned());
            break;
        }
        let Some((flag, value)) = split_flag(arg) else {
            return Err(CliError::Unrecognized(arg.clone()));
        };
        match flag {
            "--apid" => apid = Some(require_value("apid", value)?.to_string()),
            "--wlm" => {
                let raw = require_value("wlm", value)?;
                wlm = Some(raw.parse::<u8>().map_err(|_| CliError::InvalidValue("wlm", raw.to_string()))?);
            }
            "--path" => path = Some(std::path::PathBuf::from(require_value("path", value)?)),
            "--directory" => directory = Some(require_value("directory", value)?.to_string()),
            "--inst" => {
                let raw = require_value("inst", value)?;
                inst = Some(raw.parse::<u32>().map_err(|_| CliError::InvalidValue("inst", raw.to_string()))?);
            }
            "--manifest" => manifest = Some(require_value("manifest", value)?.to_string()),
            "--binary" => binary = Some(require_value("binary", value)?.to_string()),
            "--env" => {
                let raw = require_value("env", value)?;
                let (key, val) = raw
                    .split_once('=')
                    .ok_or_else(|| CliError::InvalidValue("env", raw.to_string()))?;
                env.push((key.to_string(), val.to_string()));
            }
            "--apath" => apath = Some(std::path::PathBuf::from(require_value("apath", value)?)),
            "--ldlibrarypath" => ldlibrarypath = Some(require_value("ldlibrarypath", value)?.to_string()),
            "--clean" => clean = true,
            "--debug" => debug = true,
            other => return Err(CliError::Unrecognized(other.to_string())),
        }
    }

    Ok(Args {
        apid: apid.ok_or(CliError::MissingRequired("apid"))?,
        wlm: wlm.ok_or(CliError::MissingRequired("wlm"))?,
        path: path.ok_or(CliError::MissingRequired("path"))?,
        directory: directory.ok_or(CliError::MissingRequired("directory"))?,
        inst: inst.ok_or(CliError::MissingRequired("inst"))?,
        manifest,
        binary,
        env,
        apath,
        ldlibrarypath,
        clean,
        debug,
        trailing_args,
    })
}

/// Split `--flag=value` or bare `--flag` into `(flag, Option<value>)`.
fn split_flag(arg: &str) -> Option<(&str, Option<&str>)> {
    if !arg.starts_with("--") {
        return None;
    }
    match arg.split_once('=') {
        Some((flag, value)) => Some((flag, Some(value))),
        None => Some((arg, None)),
    }
}

fn require_value<'a>(flag: &'static str, value: Option<&'a str>) -> Result<&'a str, CliError> {
    value.ok_or(CliError::MissingRequired(flag))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_full_argument_set() {
        let args = parse(&argv(&[
            "--apid=42.0",
            "--wlm=1",
            "--path=/scratch/tool",
            "--directory=abc123",
            "--inst=1",
            "--manifest=abc123_1.tar",
            "--binary=mytool",
            "--env=FOO=bar",
            "--env=BAZ=qux",
            "--ldlibrarypath=/stage/lib.1",
            "--debug",
            "--",
            "--flag",
            "positional",
        ]))
        .unwrap();

        assert_eq!(args.apid, "42.0");
        assert_eq!(args.wlm, 1);
        assert_eq!(args.path, std::path::PathBuf::from("/scratch/tool"));
        assert_eq!(args.inst, 1);
        assert_eq!(args.manifest.as_deref(), Some("abc123_1.tar"));
        assert_eq!(args.binary.as_deref(), Some("mytool"));
        assert_eq!(
            args.env,
            vec![("FOO".to_string(), "bar".to_string()), ("BAZ".to_string(), "qux".to_string())]
        );
        assert!(args.debug);
        assert!(!args.clean);
        assert_eq!(args.trailing_args, vec!["--flag".to_string(), "positional".to_string()]);
    }

    #[test]
    fn missing_required_flag_is_rejected() {
        let err = parse(&argv(&["--apid=42.0"])).unwrap_err();
        assert!(matches!(err, CliError::MissingRequired("wlm")));
    }

    #[test]
    fn clean_only_invocation_has_no_binary() {
        let args = parse(&argv(&[
            "--apid=42.0",
            "--wlm=6",
            "--path=/scratch/tool",
            "--directory=abc123",
            "--inst=1",
            "--clean",
        ]))
        .unwrap();
        assert!(args.clean);
        assert!(args.binary.is_none());
    }
}
