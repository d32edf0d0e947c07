use std::io::{BufReader, Write};
use std::net::{Ipv4Addr, TcpListener, TcpStream};
use std::path::Path;

use anyhow::Context;

use crate::nimbus::error::{FsError, Result};
use crate::nimbus::fs::FileSys;
use crate::nimbus::proto::{self, Request};

/// Binds the listen socket and serves exactly one client to completion.
/// Further connect attempts queue behind the kernel backlog until this
/// process exits.
pub fn serve(port: u16, disk: &Path) -> anyhow::Result<()> {
    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
        .with_context(|| format!("could not listen on port {port}"))?;
    println!("Waiting for connection...");

    let (stream, peer) = listener.accept().context("accept failed")?;
    println!("Client connected from {peer}");

    let fs = FileSys::mount(disk)?;
    eprintln!(
        "Mounted {} ({} free blocks)",
        disk.display(),
        fs.disk().free_blocks()
    );
    session(stream, fs)
}

/// One client session: read a frame, dispatch, answer, repeat until the peer
/// closes. The file system is unmounted on the way out.
pub fn session(stream: TcpStream, mut fs: FileSys) -> anyhow::Result<()> {
    let mut reader = BufReader::new(stream.try_clone().context("could not clone the socket")?);
    let mut writer = stream;

    while let Some(frame) = proto::read_frame(&mut reader)? {
        let text = String::from_utf8_lossy(&frame);
        let line = text.split("\r\n").next().unwrap_or_default();
        let reply = handle_line(&mut fs, line);
        writer.write_all(&reply).context("write failed")?;
    }

    fs.unmount();
    Ok(())
}

fn handle_line(fs: &mut FileSys, line: &str) -> Vec<u8> {
    let outcome = match Request::parse(line) {
        Some(request) => dispatch(fs, request),
        None => Err(FsError::CommandNotFound),
    };
    match outcome {
        Ok(body) => proto::encode_response(proto::OK_CODE, proto::OK_SYMBOL, &body),
        Err(err) => proto::encode_response(err.code(), err.symbol(), &[]),
    }
}

fn dispatch(fs: &mut FileSys, request: Request) -> Result<Vec<u8>> {
    match request {
        Request::Mkdir(name) => fs.mkdir(&name).map(|()| Vec::new()),
        Request::Cd(name) => fs.cd(&name).map(|()| Vec::new()),
        Request::Home => {
            fs.home();
            Ok(Vec::new())
        }
        Request::Rmdir(name) => fs.rmdir(&name).map(|()| Vec::new()),
        Request::Ls => fs.ls().map(String::into_bytes),
        Request::Create(name) => fs.create(&name).map(|()| Vec::new()),
        Request::Append(name, data) => fs.append(&name, data.as_bytes()).map(|()| Vec::new()),
        Request::Cat(name) => fs.cat(&name),
        Request::Head(name, count) => fs.head(&name, count as usize),
        Request::Rm(name) => fs.rm(&name).map(|()| Vec::new()),
        Request::Stat(name) => fs.stat(&name).map(String::into_bytes),
    }
}
