fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use filedepot_checkpoint::CheckpointStore;
    use filedepot_client::{ClientError, FileClient};
    use filedepot_protocol::FramedStream;
    use filedepot_server::{FileServer, ServerConfig};
    use filedepot_transfer::digest_bytes;
    use tokio::net::TcpStream;

    struct Harness {
        server: Arc<FileServer>,
        handle: tokio::task::JoinHandle<()>,
        addr: SocketAddr,
        dir: tempfile::TempDir,
    }

    impl Harness {
        /// Server root lives at `<dir>/depot`, its checkpoint file at
        /// `<dir>/depot-checkpoints.json`; clients get their own subdirs.
        async fn start() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let config = ServerConfig {
                port: 0,
                root: dir.path().join("depot"),
                checkpoint_path: dir.path().join("depot-checkpoints.json"),
                idle_timeout: Duration::from_secs(10),
                max_sessions: 8,
            };
            let server = FileServer::new(config).unwrap();
            let runner = Arc::clone(&server);
            let handle = tokio::spawn(async move {
                runner.run().await.unwrap();
            });
            let mut addr = None;
            for _ in 0..100 {
                addr = server.local_addr().await;
                if addr.is_some() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            Self {
                server,
                handle,
                addr: addr.expect("server failed to bind"),
                dir,
            }
        }

        async fn client(&self, label: &str) -> FileClient<TcpStream> {
            FileClient::connect(self.addr, &self.dir.path().join(label))
                .await
                .unwrap()
        }

        fn depot_path(&self, name: &str) -> std::path::PathBuf {
            self.dir.path().join("depot").join(name)
        }

        fn server_checkpoints(&self) -> serde_json::Value {
            let raw = std::fs::read_to_string(self.dir.path().join("depot-checkpoints.json"))
                .unwrap_or_else(|_| "{}".to_string());
            serde_json::from_str(&raw).unwrap()
        }

        async fn stop(self) {
            self.server.shutdown();
            self.handle.await.unwrap();
        }
    }

    fn write_file(dir: &Path, name: &str, data: &[u8]) -> std::path::PathBuf {
        std::fs::create_dir_all(dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    #[tokio::test]
    async fn upload_then_list_and_stored_bytes() {
        let h = Harness::start().await;
        let mut client = h.client("c1").await;

        let data = b"quarterly numbers".to_vec();
        let src = write_file(&h.dir.path().join("outbox"), "report.txt", &data);

        let outcome = client.upload(&src).await.unwrap();
        assert!(outcome.is_verified());

        assert_eq!(client.list().await.unwrap(), ["report.txt"]);
        assert_eq!(std::fs::read(h.depot_path("report.txt")).unwrap(), data);

        h.stop().await;
    }

    #[tokio::test]
    async fn colliding_upload_archives_previous_version() {
        let h = Harness::start().await;
        let mut client = h.client("c1").await;
        let outbox = h.dir.path().join("outbox");

        let first = b"version one".to_vec();
        let second = b"version two, longer".to_vec();

        let src = write_file(&outbox, "report.txt", &first);
        assert!(client.upload(&src).await.unwrap().is_verified());

        let src = write_file(&outbox, "report.txt", &second);
        assert!(client.upload(&src).await.unwrap().is_verified());

        // The original is archived under versions/, the new upload is the
        // current file, and both contents survive intact.
        assert_eq!(client.list().await.unwrap(), ["report_v2.txt"]);
        assert_eq!(
            std::fs::read(h.depot_path("versions/report_v1.txt")).unwrap(),
            first
        );
        assert_eq!(std::fs::read(h.depot_path("report_v2.txt")).unwrap(), second);

        h.stop().await;
    }

    #[tokio::test]
    async fn download_roundtrip_is_byte_identical() {
        let h = Harness::start().await;
        let mut client = h.client("c1").await;

        let data: Vec<u8> = (0..100_000u32).flat_map(|i| i.to_le_bytes()).collect();
        let src = write_file(&h.dir.path().join("outbox"), "blob.bin", &data);
        assert!(client.upload(&src).await.unwrap().is_verified());

        let inbox = h.dir.path().join("inbox");
        let outcome = client.download("blob.bin", &inbox).await.unwrap();
        assert!(outcome.is_verified());
        assert_eq!(std::fs::read(inbox.join("blob.bin")).unwrap(), data);

        h.stop().await;
    }

    #[tokio::test]
    async fn download_of_missing_file_is_an_error_without_side_effects() {
        let h = Harness::start().await;
        let mut client = h.client("c1").await;

        let inbox = h.dir.path().join("inbox");
        let result = client.download("nope.bin", &inbox).await;
        assert!(matches!(result, Err(ClientError::NotFound(_))));
        assert!(!inbox.join("nope.bin").exists());

        // The session survives the failed exchange.
        assert!(client.list().await.unwrap().is_empty());

        h.stop().await;
    }

    #[tokio::test]
    async fn resumed_download_completes_and_verifies() {
        let h = Harness::start().await;
        let mut uploader = h.client("uploader").await;

        let data: Vec<u8> = (0..50_000u32).flat_map(|i| i.to_be_bytes()).collect();
        let src = write_file(&h.dir.path().join("outbox"), "big.bin", &data);
        assert!(uploader.upload(&src).await.unwrap().is_verified());

        // Fake an interrupted earlier download: a true prefix on disk plus a
        // matching checkpoint record, written before the client opens the
        // same state directory.
        let split = 30_000usize;
        let state_dir = h.dir.path().join("resumer");
        let inbox = h.dir.path().join("inbox");
        write_file(&inbox, "big.bin", &data[..split]);
        std::fs::create_dir_all(&state_dir).unwrap();
        let store = CheckpointStore::open(state_dir.join("checkpoints.json")).unwrap();
        store.record("big.bin", "earlier-run", split as u64).await.unwrap();
        drop(store);

        let mut resumer = FileClient::connect(h.addr, &state_dir).await.unwrap();
        let outcome = resumer.download("big.bin", &inbox).await.unwrap();
        assert!(outcome.is_verified());
        assert_eq!(std::fs::read(inbox.join("big.bin")).unwrap(), data);

        h.stop().await;
    }

    #[tokio::test]
    async fn resume_really_keeps_the_prefix() {
        // A corrupt prefix must surface as a digest mismatch: if the client
        // silently restarted from zero instead of resuming, the file would
        // come out correct and hide the corruption.
        let h = Harness::start().await;
        let mut uploader = h.client("uploader").await;

        let data = vec![0xABu8; 40_000];
        let src = write_file(&h.dir.path().join("outbox"), "big.bin", &data);
        assert!(uploader.upload(&src).await.unwrap().is_verified());

        let split = 10_000usize;
        let state_dir = h.dir.path().join("resumer");
        let inbox = h.dir.path().join("inbox");
        write_file(&inbox, "big.bin", &vec![0xCDu8; split]);
        std::fs::create_dir_all(&state_dir).unwrap();
        let store = CheckpointStore::open(state_dir.join("checkpoints.json")).unwrap();
        store.record("big.bin", "earlier-run", split as u64).await.unwrap();
        drop(store);

        let mut resumer = FileClient::connect(h.addr, &state_dir).await.unwrap();
        let outcome = resumer.download("big.bin", &inbox).await.unwrap();
        assert!(!outcome.is_verified());

        h.stop().await;
    }

    #[tokio::test]
    async fn checkpoint_recorded_then_cleared_by_full_download() {
        let h = Harness::start().await;
        let mut client = h.client("c1").await;

        let data = b"checkpointed content".to_vec();
        let src = write_file(&h.dir.path().join("outbox"), "doc.txt", &data);
        assert!(client.upload(&src).await.unwrap().is_verified());

        client.checkpoint("doc.txt", 7).await.unwrap();
        let records = h.server_checkpoints();
        assert_eq!(records["doc.txt"]["offset"], 7);

        // A download served to completion retires the server-side record.
        let inbox = h.dir.path().join("inbox");
        assert!(client.download("doc.txt", &inbox).await.unwrap().is_verified());
        let records = h.server_checkpoints();
        assert!(records.get("doc.txt").is_none());

        h.stop().await;
    }

    // Raw exchanges below pin the exact wire format independently of the
    // client implementation.

    #[tokio::test]
    async fn raw_upload_exchange_wire_format() {
        let h = Harness::start().await;

        let stream = TcpStream::connect(h.addr).await.unwrap();
        let mut wire = FramedStream::new(stream);

        let body = b"hello depot";
        wire.write_line(&format!("UPLOAD wire.bin {}", body.len()))
            .await
            .unwrap();
        assert_eq!(wire.read_line().await.unwrap(), "READY");

        let mut source = &body[..];
        wire.send_payload(&mut source, |_| {}).await.unwrap();

        let digest = wire.read_line().await.unwrap();
        assert_eq!(digest, digest_bytes(body));
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));

        h.stop().await;
    }

    #[tokio::test]
    async fn raw_download_exchange_wire_format() {
        let h = Harness::start().await;

        let body = b"served bytes".to_vec();
        std::fs::create_dir_all(h.dir.path().join("depot")).unwrap();
        std::fs::write(h.depot_path("wire.bin"), &body).unwrap();

        let stream = TcpStream::connect(h.addr).await.unwrap();
        let mut wire = FramedStream::new(stream);

        wire.write_line("DOWNLOAD wire.bin").await.unwrap();
        assert_eq!(wire.read_line().await.unwrap(), body.len().to_string());

        wire.write_line("READY").await.unwrap();
        let mut sink = Vec::new();
        wire.receive_payload(body.len() as u64, &mut sink, |_| {})
            .await
            .unwrap();
        assert_eq!(sink, body);

        assert_eq!(wire.read_line().await.unwrap(), digest_bytes(&body));

        h.stop().await;
    }

    #[tokio::test]
    async fn raw_resume_streams_only_the_tail() {
        let h = Harness::start().await;

        let body: Vec<u8> = (0..2_000u16).flat_map(|i| i.to_le_bytes()).collect();
        std::fs::create_dir_all(h.dir.path().join("depot")).unwrap();
        std::fs::write(h.depot_path("wire.bin"), &body).unwrap();

        let stream = TcpStream::connect(h.addr).await.unwrap();
        let mut wire = FramedStream::new(stream);

        wire.write_line("DOWNLOAD wire.bin").await.unwrap();
        assert_eq!(wire.read_line().await.unwrap(), body.len().to_string());

        wire.write_line("RESUME 1000").await.unwrap();
        let tail = body.len() as u64 - 1000;
        let mut sink = Vec::new();
        wire.receive_payload(tail, &mut sink, |_| {}).await.unwrap();
        assert_eq!(sink, body[1000..]);

        // Digest of the whole file, so a resumed transfer verifies against
        // the same value as a fresh one.
        assert_eq!(wire.read_line().await.unwrap(), digest_bytes(&body));

        h.stop().await;
    }

    #[tokio::test]
    async fn garbage_lines_do_not_poison_later_commands() {
        let h = Harness::start().await;

        let stream = TcpStream::connect(h.addr).await.unwrap();
        let mut wire = FramedStream::new(stream);

        wire.write_line("FETCH everything").await.unwrap();
        wire.write_line("UPLOAD").await.unwrap();
        wire.write_line("UPLOAD name notanumber").await.unwrap();
        wire.write_line("LIST extra args").await.unwrap();

        wire.write_line("LIST").await.unwrap();
        assert_eq!(wire.read_line().await.unwrap(), "");

        h.stop().await;
    }
}
