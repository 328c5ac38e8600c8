//! Unit tests for CLI commands

use super::commands::addr_for_test;
use crate::cli::{Cli, Commands};
use clap::Parser;
use std::path::PathBuf;

#[test]
fn test_serve_command_with_flags() {
    let cli = Cli::try_parse_from([
        "dio", "serve", "--root", "app", "--addr", "127.0.0.1:9000", "--watch", "--workers", "2",
    ])
    .unwrap();

    match cli.command {
        Commands::Serve {
            app,
            addr,
            workers,
            watch,
        } => {
            assert_eq!(app.root, Some(PathBuf::from("app")));
            assert_eq!(addr.as_deref(), Some("127.0.0.1:9000"));
            assert_eq!(workers, Some(2));
            assert!(watch);
        }
        _ => panic!("Expected Serve command"),
    }
}

#[test]
fn test_routes_command_requires_controller() {
    assert!(Cli::try_parse_from(["dio", "routes"]).is_err());
    let cli = Cli::try_parse_from(["dio", "routes", "post", "--config", "dio.yaml"]).unwrap();
    match cli.command {
        Commands::Routes { controller, app } => {
            assert_eq!(controller, "post");
            assert_eq!(app.config, Some(PathBuf::from("dio.yaml")));
        }
        _ => panic!("Expected Routes command"),
    }
}

#[test]
fn test_unknown_command_fails() {
    assert!(Cli::try_parse_from(["dio", "generate"]).is_err());
}

#[test]
fn test_addr_parsing() {
    let s = addr_for_test("0.0.0.0:8080").unwrap();
    assert_eq!((s.host.as_str(), s.port), ("0.0.0.0", 8080));

    let s = addr_for_test(":4000").unwrap();
    assert_eq!((s.host.as_str(), s.port), ("localhost", 4000));

    let s = addr_for_test("[::1]:4000").unwrap();
    assert_eq!(s.host, "::1");

    assert!(addr_for_test("localhost").is_err());
    assert!(addr_for_test("localhost:http").is_err());
}
