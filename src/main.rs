use std::path::PathBuf;

use clap::{value_parser, Arg, Command};

fn main() -> anyhow::Result<()> {
    let matches = Command::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("mkfs").about("Create a new disk image").arg(
                Arg::new("image")
                    .required(true)
                    .value_parser(value_parser!(PathBuf))
                    .help("Location of the new disk image"),
            ),
        )
        .subcommand(
            Command::new("serve")
                .about("Serve a disk image to a single client over TCP")
                .arg(
                    Arg::new("port")
                        .required(true)
                        .value_parser(value_parser!(u16))
                        .help("TCP port to listen on"),
                )
                .arg(
                    Arg::new("disk")
                        .short('d')
                        .long("disk")
                        .default_value("nfs.img")
                        .value_parser(value_parser!(PathBuf))
                        .help("Disk image backing the file system"),
                ),
        )
        .subcommand(
            Command::new("shell")
                .about("Connect a shell to a running server")
                .arg(
                    Arg::new("server")
                        .required(true)
                        .help("Server location as host:port"),
                )
                .arg(
                    Arg::new("script")
                        .short('s')
                        .long("script")
                        .value_parser(value_parser!(PathBuf))
                        .help("Run commands from a script instead of stdin"),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("mkfs", matches)) => {
            nimbusfs::mkfs::make(matches.get_one::<PathBuf>("image").unwrap())
        }
        Some(("serve", matches)) => {
            let port = *matches.get_one::<u16>("port").unwrap();
            let disk = matches.get_one::<PathBuf>("disk").unwrap();
            nimbusfs::server::serve(port, disk)
        }
        Some(("shell", matches)) => {
            let server = matches.get_one::<String>("server").unwrap();
            let mut shell = nimbusfs::shell::Shell::connect(server)?;
            match matches.get_one::<PathBuf>("script") {
                Some(script) => shell.run_script(script),
                None => shell.run(),
            }
        }
        _ => unreachable!(),
    }
}
