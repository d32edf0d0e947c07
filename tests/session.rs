//! Wire-level scenarios: a real server session on one end of a TCP
//! connection, a scripted client on the other, each test on a fresh disk.

use std::io::{BufReader, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use nimbusfs::nimbus::fs::FileSys;
use nimbusfs::nimbus::proto::{self, Response};
use nimbusfs::nimbus::MAX_FILE_SIZE;
use nimbusfs::server;

struct TestClient {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    server: Option<JoinHandle<anyhow::Result<()>>>,
    disk: PathBuf,
}

impl TestClient {
    fn start(name: &str) -> Self {
        let mut disk = std::env::temp_dir();
        disk.push(format!("nimbusfs_session_{name}.img"));
        let _ = std::fs::remove_file(&disk);

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let fs = FileSys::mount(&disk).unwrap();
        let server = thread::spawn(move || -> anyhow::Result<()> {
            let (stream, _) = listener.accept()?;
            server::session(stream, fs)
        });

        let stream = TcpStream::connect(addr).unwrap();
        Self {
            reader: BufReader::new(stream.try_clone().unwrap()),
            writer: stream,
            server: Some(server),
            disk,
        }
    }

    fn request(&mut self, line: &str) -> Response {
        self.writer
            .write_all(format!("{line}\r\n\0").as_bytes())
            .unwrap();
        let frame = proto::read_frame(&mut self.reader)
            .unwrap()
            .expect("server closed mid-session");
        Response::decode(&frame).unwrap()
    }

    fn expect_ok(&mut self, line: &str) -> Response {
        let response = self.request(line);
        assert_eq!(
            (response.code, response.symbol.as_str()),
            (200, "OK"),
            "`{line}` failed"
        );
        response
    }

    /// Closes the write side, which the server sees as a clean disconnect.
    fn finish(mut self) {
        self.writer.shutdown(Shutdown::Write).unwrap();
        if let Some(handle) = self.server.take() {
            handle.join().unwrap().unwrap();
        }
        let _ = std::fs::remove_file(&self.disk);
    }
}

#[test]
fn mkdir_then_ls() {
    let mut client = TestClient::start("mkdir_then_ls");

    let response = client.expect_ok("mkdir dir1");
    assert!(response.body.is_empty());

    let response = client.expect_ok("ls");
    assert_eq!(response.body, b"dir1/\n\n");

    client.finish();
}

#[test]
fn create_append_cat() {
    let mut client = TestClient::start("create_append_cat");

    client.expect_ok("create foo");
    client.expect_ok("append foo hello");
    let response = client.expect_ok("cat foo");
    assert_eq!(response.body, b"hello\n");

    client.finish();
}

#[test]
fn duplicate_create_reports_file_exists() {
    let mut client = TestClient::start("duplicate_create");

    client.expect_ok("create foo");
    let response = client.request("create foo");
    assert_eq!(response.code, 502);
    assert_eq!(response.symbol, "FILE_EXISTS");
    assert!(response.body.is_empty());

    client.finish();
}

#[test]
fn mkdir_cd_home_rmdir_leaves_an_empty_listing() {
    let mut client = TestClient::start("cd_home_rmdir");

    client.expect_ok("mkdir d");
    client.expect_ok("cd d");
    client.expect_ok("home");
    client.expect_ok("rmdir d");
    let response = client.expect_ok("ls");
    assert_eq!(response.body, b"\n");

    client.finish();
}

#[test]
fn append_to_the_size_ceiling_then_overflow() {
    let mut client = TestClient::start("size_ceiling");

    client.expect_ok("create f");
    client.expect_ok(&format!("append f {}", "A".repeat(MAX_FILE_SIZE)));

    let response = client.request("append f B");
    assert_eq!(response.code, 508);
    assert_eq!(response.symbol, "APPEND_EXCEEDS_MAX_SIZE");

    let response = client.expect_ok("cat f");
    assert_eq!(response.body.len(), MAX_FILE_SIZE + 1);

    client.finish();
}

#[test]
fn stat_on_a_missing_name() {
    let mut client = TestClient::start("stat_missing");

    let response = client.request("stat nonexistent");
    assert_eq!(response.code, 503);
    assert_eq!(response.symbol, "FILE_NOT_EXISTS");

    client.finish();
}

#[test]
fn unknown_commands_get_command_not_found() {
    let mut client = TestClient::start("unknown_command");

    let response = client.request("frobnicate x");
    assert_eq!(response.code, 509);
    assert_eq!(response.symbol, "COMMAND_NOT_FOUND");

    // The session keeps going afterwards.
    client.expect_ok("ls");

    client.finish();
}

#[test]
fn stat_bodies_are_exact() {
    let mut client = TestClient::start("stat_bodies");

    client.expect_ok("mkdir d");
    let response = client.expect_ok("stat d");
    assert_eq!(response.body, b"Directory name: d/\nDirectory block: 2\n");

    client.expect_ok("create f");
    let response = client.expect_ok("stat f");
    assert_eq!(
        response.body,
        b"iNode block: 3\nBytes in files: 0\nNumber of blocks: 1\nFirst block: N/A\n"
    );

    client.expect_ok("append f hi");
    let response = client.expect_ok("stat f");
    assert_eq!(
        response.body,
        b"iNode block: 3\nBytes in files: 2\nNumber of blocks: 2\nFirst block: 4\n"
    );

    client.finish();
}

#[test]
fn head_boundaries_over_the_wire() {
    let mut client = TestClient::start("head_wire");

    client.expect_ok("create f");
    let response = client.expect_ok("cat f");
    assert!(response.body.is_empty(), "empty file has no body at all");

    client.expect_ok("append f hello");
    let response = client.expect_ok("head f 0");
    assert_eq!(response.body, b"\n");
    let response = client.expect_ok("head f 4");
    assert_eq!(response.body, b"hell\n");

    client.finish();
}

#[test]
fn cd_onto_a_file_is_refused() {
    let mut client = TestClient::start("cd_file");

    client.expect_ok("create plain");
    let response = client.request("cd plain");
    assert_eq!(response.code, 500);
    assert_eq!(response.symbol, "FILE_NOT_DIR");

    // The cursor stayed put.
    let response = client.expect_ok("ls");
    assert_eq!(response.body, b"plain\n\n");

    client.finish();
}
