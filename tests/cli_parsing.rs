use clap::Parser;
use rsc_cache::cli::{Cli, Commands};
use std::path::PathBuf;

#[test]
fn test_parse_observe_defaults() {
    let cli = Cli::try_parse_from(["rsc-cache", "observe"]).unwrap();

    match cli.command {
        Commands::Observe(args) => {
            assert_eq!(args.bind, "127.0.0.1:18998");
            assert!(!args.once);
        }
        Commands::Demo(_) => panic!("Wrong command"),
    }
    assert!(!cli.json);
}

#[test]
fn test_parse_observe_with_options() {
    let cli = Cli::try_parse_from([
        "rsc-cache",
        "observe",
        "--bind",
        "0.0.0.0:9000",
        "--once",
        "--json",
    ])
    .unwrap();

    match cli.command {
        Commands::Observe(args) => {
            assert_eq!(args.bind, "0.0.0.0:9000");
            assert!(args.once);
        }
        Commands::Demo(_) => panic!("Wrong command"),
    }
    assert!(cli.json);
}

#[test]
fn test_parse_demo_defaults() {
    let cli = Cli::try_parse_from(["rsc-cache", "demo"]).unwrap();

    match cli.command {
        Commands::Demo(args) => {
            assert_eq!(args.keys, 3);
            assert_eq!(args.delay_ms, 200);
            assert!(args.endpoint.is_none());
        }
        Commands::Observe(_) => panic!("Wrong command"),
    }
}

#[test]
fn test_parse_demo_with_endpoint_and_config() {
    let cli = Cli::try_parse_from([
        "rsc-cache",
        "--config",
        "custom.yaml",
        "demo",
        "--keys",
        "5",
        "--delay-ms",
        "10",
        "--endpoint",
        "ws://127.0.0.1:4000",
    ])
    .unwrap();

    assert_eq!(cli.config, Some(PathBuf::from("custom.yaml")));
    match cli.command {
        Commands::Demo(args) => {
            assert_eq!(args.keys, 5);
            assert_eq!(args.delay_ms, 10);
            assert_eq!(args.endpoint.as_deref(), Some("ws://127.0.0.1:4000"));
        }
        Commands::Observe(_) => panic!("Wrong command"),
    }
}

#[test]
fn test_parse_rejects_invalid_input() {
    assert!(Cli::try_parse_from(["rsc-cache"]).is_err());
    assert!(Cli::try_parse_from(["rsc-cache", "serve"]).is_err());
    assert!(Cli::try_parse_from(["rsc-cache", "demo", "--keys", "many"]).is_err());
}
