use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::net::TcpStream;
use std::path::Path;

use anyhow::Context;
use colored::Colorize;

use crate::nimbus::proto::{self, Response};

const PROMPT: &str = "NFS> ";

/// The interactive client: reads command lines, validates them locally, and
/// relays well-formed ones to the server one request per frame.
pub struct Shell {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

#[derive(Debug, PartialEq, Eq)]
enum ShellCommand {
    Quit,
    /// A validated request line, ready for the wire (without CRLF).
    Request(String),
}

impl Shell {
    /// Connects to `host:port`. Name resolution and per-address fallback come
    /// with `ToSocketAddrs`.
    pub fn connect(location: &str) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(location)
            .with_context(|| format!("could not connect to {location}"))?;
        let reader = BufReader::new(stream.try_clone()?);
        Ok(Self {
            reader,
            writer: stream,
        })
    }

    /// Prompts until the user quits or stdin closes.
    pub fn run(&mut self) -> anyhow::Result<()> {
        let stdin = io::stdin();
        loop {
            print!("{PROMPT}");
            io::stdout().flush()?;

            let mut line = String::new();
            if stdin.read_line(&mut line)? == 0 {
                break;
            }
            if self.execute(line.trim_end())? {
                break;
            }
        }
        Ok(())
    }

    /// Echoes and executes each line of a script, stopping at `quit` or EOF.
    pub fn run_script(&mut self, path: &Path) -> anyhow::Result<()> {
        let file = File::open(path)
            .with_context(|| format!("could not open script {}", path.display()))?;
        for line in BufReader::new(file).lines() {
            let line = line?;
            println!("{PROMPT}{line}");
            if self.execute(line.trim_end())? {
                break;
            }
        }
        Ok(())
    }

    /// Runs one shell line. Returns true when the user quits.
    fn execute(&mut self, line: &str) -> anyhow::Result<bool> {
        match parse_command(line) {
            Some(ShellCommand::Quit) => Ok(true),
            Some(ShellCommand::Request(request)) => {
                self.rpc(&request)?;
                Ok(false)
            }
            None => Ok(false),
        }
    }

    fn rpc(&mut self, request: &str) -> anyhow::Result<()> {
        self.writer
            .write_all(format!("{request}\r\n\0").as_bytes())
            .context("write failed")?;

        let frame = proto::read_frame(&mut self.reader)?
            .context("server closed the connection")?;
        let response = Response::decode(&frame)?;

        if response.code != proto::OK_CODE {
            eprintln!("{}", describe(response.code).red());
        }
        io::stdout().write_all(&response.body)?;
        println!();
        Ok(())
    }
}

/// Validates a command line locally, mirroring the server-side grammar, and
/// reports problems without a round trip. `None` means nothing to send.
fn parse_command(line: &str) -> Option<ShellCommand> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let (&name, args) = tokens.split_first()?;

    let arity_ok = match name {
        "ls" | "home" | "quit" => args.is_empty(),
        "mkdir" | "cd" | "rmdir" | "create" | "cat" | "rm" | "stat" => args.len() == 1,
        "append" | "head" => args.len() == 2,
        _ => {
            eprintln!(
                "{}",
                format!("Invalid command line: {name} is not a command").red()
            );
            return None;
        }
    };
    if !arity_ok {
        eprintln!(
            "{}",
            format!("Invalid command line: {name} has improper number of arguments").red()
        );
        return None;
    }

    if name == "quit" {
        return Some(ShellCommand::Quit);
    }
    if name == "head" && args[1].parse::<u32>().is_err() {
        eprintln!(
            "{}",
            format!(
                "Invalid command line: {} is not a valid number of bytes",
                args[1]
            )
            .red()
        );
        return None;
    }

    let mut request = name.to_string();
    for arg in args {
        request.push(' ');
        request.push_str(arg);
    }
    Some(ShellCommand::Request(request))
}

/// Human-readable rendering for each status code the server can send.
fn describe(code: u16) -> &'static str {
    match code {
        500 => "File is not a directory!",
        501 => "File is a directory!",
        502 => "File exists!",
        503 => "File does not exist!",
        504 => "File name is too long!",
        505 => "Disk is full!",
        506 => "Directory is full!",
        507 => "Directory is not empty!",
        508 => "Append exceeds maximum filesize!",
        509 => "Command not found!",
        _ => "Unknown response code!",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(line: &str) -> Option<String> {
        match parse_command(line)? {
            ShellCommand::Request(request) => Some(request),
            ShellCommand::Quit => None,
        }
    }

    #[test]
    fn well_formed_lines_pass_through() {
        assert_eq!(request("ls"), Some("ls".into()));
        assert_eq!(request("mkdir docs"), Some("mkdir docs".into()));
        assert_eq!(request("append f data"), Some("append f data".into()));
        assert_eq!(request("head f 10"), Some("head f 10".into()));
        // Whitespace is normalized to single separators.
        assert_eq!(request("  cat   f  "), Some("cat f".into()));
    }

    #[test]
    fn quit_is_local() {
        assert_eq!(parse_command("quit"), Some(ShellCommand::Quit));
        assert_eq!(parse_command("quit now"), None);
    }

    #[test]
    fn arity_violations_are_rejected_locally() {
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("ls stuff"), None);
        assert_eq!(parse_command("mkdir"), None);
        assert_eq!(parse_command("mkdir a b"), None);
        // Multi-token append data never reaches the wire.
        assert_eq!(parse_command("append f two words"), None);
        assert_eq!(parse_command("head f ten"), None);
        assert_eq!(parse_command("blargh"), None);
    }
}
