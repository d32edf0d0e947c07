//! Wire protocol: one NUL-terminated frame per request and per response.
//! A request is a single `\r\n`-terminated line; a response is a status line,
//! a `Length` header, a blank line, and the body.

use std::io::{self, BufRead};

use anyhow::{ensure, Context};

pub const OK_CODE: u16 = 200;
pub const OK_SYMBOL: &str = "OK";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Mkdir(String),
    Cd(String),
    Home,
    Rmdir(String),
    Ls,
    Create(String),
    Append(String, String),
    Cat(String),
    Head(String, u32),
    Rm(String),
    Stat(String),
}

impl Request {
    /// Parses one request line (without the trailing CRLF). `None` means the
    /// line does not match any command grammar and answers COMMAND_NOT_FOUND.
    pub fn parse(line: &str) -> Option<Self> {
        let (word, rest) = match line.split_once(' ') {
            Some((word, rest)) => (word, Some(rest)),
            None => (line, None),
        };

        match word {
            "ls" if rest.is_none() => Some(Self::Ls),
            "home" if rest.is_none() => Some(Self::Home),
            "mkdir" => Some(Self::Mkdir(name(rest)?)),
            "cd" => Some(Self::Cd(name(rest)?)),
            "rmdir" => Some(Self::Rmdir(name(rest)?)),
            "create" => Some(Self::Create(name(rest)?)),
            "cat" => Some(Self::Cat(name(rest)?)),
            "rm" => Some(Self::Rm(name(rest)?)),
            "stat" => Some(Self::Stat(name(rest)?)),
            "append" => {
                // Everything after the file name is data, spaces included;
                // the client shell is the one enforcing single-token data.
                let (file, data) = rest?.split_once(' ')?;
                if file.is_empty() {
                    return None;
                }
                Some(Self::Append(file.into(), data.into()))
            }
            "head" => {
                let (file, count) = rest?.split_once(' ')?;
                if file.is_empty() {
                    return None;
                }
                Some(Self::Head(file.into(), count.parse().ok()?))
            }
            _ => None,
        }
    }
}

fn name(rest: Option<&str>) -> Option<String> {
    match rest {
        Some(name) if !name.is_empty() => Some(name.into()),
        _ => None,
    }
}

pub fn encode_response(code: u16, symbol: &str, body: &[u8]) -> Vec<u8> {
    let mut frame = format!("{code} {symbol}\r\nLength: {}\r\n\r\n", body.len()).into_bytes();
    frame.extend_from_slice(body);
    frame.push(0);
    frame
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub code: u16,
    pub symbol: String,
    pub body: Vec<u8>,
}

impl Response {
    /// Decodes a full response frame (without the trailing NUL).
    pub fn decode(frame: &[u8]) -> anyhow::Result<Self> {
        let (status, rest) = split_crlf(frame).context("missing status line")?;
        let status = std::str::from_utf8(status).context("status line is not UTF-8")?;
        let (code, symbol) = status.split_once(' ').context("malformed status line")?;

        let (length, rest) = split_crlf(rest).context("missing length header")?;
        let length: usize = std::str::from_utf8(length)
            .ok()
            .and_then(|h| h.strip_prefix("Length: "))
            .context("malformed length header")?
            .parse()
            .context("malformed length value")?;

        let (blank, body) = split_crlf(rest).context("missing header terminator")?;
        ensure!(blank.is_empty(), "malformed header terminator");
        ensure!(
            body.len() == length,
            "body is {} bytes but the header declared {length}",
            body.len()
        );

        Ok(Self {
            code: code.parse().context("malformed status code")?,
            symbol: symbol.to_string(),
            body: body.to_vec(),
        })
    }
}

fn split_crlf(buf: &[u8]) -> Option<(&[u8], &[u8])> {
    let pos = buf.windows(2).position(|w| w == b"\r\n")?;
    Some((&buf[..pos], &buf[pos + 2..]))
}

/// Reads one NUL-terminated frame, the NUL stripped. `None` means the peer
/// closed the stream before completing a frame.
pub fn read_frame<R: BufRead>(reader: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut frame = Vec::new();
    let n = reader.read_until(0, &mut frame)?;
    if n == 0 || frame.last() != Some(&0) {
        return Ok(None);
    }
    frame.pop();
    Ok(Some(frame))
}
