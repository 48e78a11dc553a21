//! Tests for run, serve and hosts subcommands.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use std::path::Path;

#[test]
fn cli_parse_run_defaults() {
    let cli = parse(&["zackup", "run"]);
    assert!(cli.config.is_none());
    match cli.command {
        CliCommand::Run { hosts, parallel } => {
            assert!(hosts.is_empty());
            assert!(parallel.is_none());
        }
        _ => panic!("expected Run"),
    }
}

#[test]
fn cli_parse_run_hosts_and_parallel() {
    match parse(&["zackup", "run", "db1", "web1", "--parallel", "8"]).command {
        CliCommand::Run { hosts, parallel } => {
            assert_eq!(hosts, vec!["db1", "web1"]);
            assert_eq!(parallel, Some(8));
        }
        _ => panic!("expected Run with hosts"),
    }
}

#[test]
fn cli_parse_run_negative_parallel_is_accepted() {
    // Clamped later by the scheduler, not rejected here.
    match parse(&["zackup", "run", "--parallel", "-5"]).command {
        CliCommand::Run { parallel, .. } => assert_eq!(parallel, Some(-5)),
        _ => panic!("expected Run"),
    }
}

#[test]
fn cli_parse_serve_with_global_config() {
    let cli = parse(&["zackup", "serve", "--config", "/etc/zackup.toml"]);
    assert_eq!(cli.config.as_deref(), Some(Path::new("/etc/zackup.toml")));
    match cli.command {
        CliCommand::Serve { parallel } => assert!(parallel.is_none()),
        _ => panic!("expected Serve"),
    }
}

#[test]
fn cli_parse_hosts() {
    assert!(matches!(
        parse(&["zackup", "--config", "c.toml", "hosts"]).command,
        CliCommand::Hosts
    ));
}

#[test]
fn cli_rejects_unknown_subcommand() {
    assert!(Cli::try_parse_from(["zackup", "restore"]).is_err());
}
