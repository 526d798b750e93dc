fn main() {
    println!("Run `cargo test -p end-to-end` to execute the transfer integration tests.");
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;

    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio_util::sync::CancellationToken;

    use fileshelf_client::FileClient;
    use fileshelf_protocol::wire::{
        self, DownloadReply, OP_DOWNLOAD, OP_UPLOAD, UploadReply,
    };
    use fileshelf_protocol::{TransferLimits, TransferMetadata, TransferStatus};
    use fileshelf_server::{FileServer, ServerConfig};
    use fileshelf_transfer::TransferError;

    /// Small caps so multi-chunk paths run fast.
    const FRAME_CAP: usize = 4 * 1024;

    fn test_limits() -> TransferLimits {
        TransferLimits {
            frame_cap: FRAME_CAP,
            max_transfer_size: 64 * 1024 * 1024,
        }
    }

    struct Fixture {
        server: Arc<FileServer>,
        handle: tokio::task::JoinHandle<()>,
        addr: SocketAddr,
        root: TempDir,
        local: TempDir,
    }

    impl Fixture {
        async fn start() -> Self {
            let root = TempDir::new().unwrap();
            let local = TempDir::new().unwrap();

            let server = FileServer::new(ServerConfig {
                port: 0,
                storage_root: root.path().to_path_buf(),
                limits: test_limits(),
            });
            let server2 = Arc::clone(&server);
            let handle = tokio::spawn(async move {
                server2.run().await.unwrap();
            });
            for _ in 0..50 {
                if server.local_addr().await.is_some() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            let mut addr = server.local_addr().await.expect("server should bind");
            addr.set_ip("127.0.0.1".parse().unwrap());

            Self {
                server,
                handle,
                addr,
                root,
                local,
            }
        }

        fn client(&self) -> FileClient {
            FileClient::new(self.addr).with_limits(test_limits())
        }

        fn write_local(&self, name: &str, data: &[u8]) -> std::path::PathBuf {
            let path = self.local.path().join(name);
            std::fs::write(&path, data).unwrap();
            path
        }

        async fn stop(self) {
            self.server.shutdown();
            self.handle.await.unwrap();
        }
    }

    async fn round_trip(data: &[u8]) {
        let fx = Fixture::start().await;
        let client = fx.client();
        let cancel = CancellationToken::new();

        let src = fx.write_local("payload.bin", data);
        let up = client.upload(&src, &cancel).await.unwrap();
        assert_eq!(up.status, TransferStatus::Ok);
        assert_eq!(up.bytes_transferred, data.len() as u64);

        let dest = TempDir::new().unwrap();
        let (md, down) = client
            .download("payload.bin", dest.path(), &cancel)
            .await
            .unwrap();
        assert_eq!(md.filename, "payload.bin");
        assert_eq!(md.size, data.len() as u64);
        assert_eq!(down.bytes_transferred, data.len() as u64);

        let got = std::fs::read(dest.path().join("payload.bin")).unwrap();
        assert_eq!(got, data, "downloaded bytes must match the original");

        fx.stop().await;
    }

    #[tokio::test]
    async fn round_trip_empty_file() {
        round_trip(b"").await;
    }

    #[tokio::test]
    async fn round_trip_below_one_frame() {
        round_trip(b"just a few bytes").await;
    }

    #[tokio::test]
    async fn round_trip_exact_frame_multiple() {
        let data: Vec<u8> = (0..FRAME_CAP * 4).map(|i| (i % 251) as u8).collect();
        round_trip(&data).await;
    }

    #[tokio::test]
    async fn round_trip_frame_multiple_plus_remainder() {
        let data: Vec<u8> = (0..FRAME_CAP * 2 + 1717).map(|i| (i % 253) as u8).collect();
        round_trip(&data).await;
    }

    #[tokio::test]
    async fn round_trip_many_frames() {
        // 100x the frame cap; peak memory stays at one frame per side.
        let data: Vec<u8> = (0..FRAME_CAP * 100).map(|i| (i % 241) as u8).collect();
        round_trip(&data).await;
    }

    /// The concrete scenario: a file of 2.5 caps uploads as exactly
    /// three chunks (cap, cap, half-cap) and downloads back the same way.
    #[tokio::test]
    async fn three_chunk_scenario_on_the_wire() {
        let fx = Fixture::start().await;
        let client = fx.client();
        let cancel = CancellationToken::new();

        let size = FRAME_CAP * 2 + FRAME_CAP / 2;
        let data: Vec<u8> = (0..size).map(|i| (i % 239) as u8).collect();
        let src = fx.write_local("three.bin", &data);
        let up = client.upload(&src, &cancel).await.unwrap();
        assert!(up.is_ok());

        // Raw-socket download to observe the actual frame sequence.
        let mut stream = tokio::net::TcpStream::connect(fx.addr).await.unwrap();
        wire::write_op(&mut stream, OP_DOWNLOAD).await.unwrap();
        wire::write_name(&mut stream, "three.bin").await.unwrap();

        assert_eq!(
            wire::read_download_reply(&mut stream).await.unwrap(),
            DownloadReply::Accepted
        );
        let md = wire::read_metadata(&mut stream).await.unwrap();
        assert_eq!(md.filename, "three.bin");
        assert_eq!(md.size, size as u64);

        let mut sizes = Vec::new();
        let mut received = Vec::new();
        while let Some(chunk) = wire::read_chunk(&mut stream, FRAME_CAP).await.unwrap() {
            sizes.push(chunk.len());
            received.extend_from_slice(&chunk);
        }
        assert_eq!(sizes, vec![FRAME_CAP, FRAME_CAP, FRAME_CAP / 2]);
        assert_eq!(received, data);

        fx.stop().await;
    }

    /// A sender that lies about the declared size gets a Failed status,
    /// not a call error.
    #[tokio::test]
    async fn upload_integrity_mismatch_reported_as_status() {
        let fx = Fixture::start().await;

        let mut stream = tokio::net::TcpStream::connect(fx.addr).await.unwrap();
        wire::write_op(&mut stream, OP_UPLOAD).await.unwrap();
        let metadata = TransferMetadata {
            filename: "liar.bin".into(),
            size: 100,
            timestamp: "2026-08-31T11:00:00+00:00".into(),
        };
        wire::write_metadata(&mut stream, &metadata).await.unwrap();
        wire::write_chunk(&mut stream, &[0u8; 50]).await.unwrap();
        wire::write_end_marker(&mut stream).await.unwrap();

        assert_eq!(
            wire::read_upload_reply(&mut stream).await.unwrap(),
            UploadReply::Status(TransferStatus::Failed)
        );

        fx.stop().await;
    }

    /// A server that declares more bytes than it streams must fail the
    /// download on the client side.
    #[tokio::test]
    async fn download_integrity_mismatch_is_fatal() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Hand-rolled server that lies in the size header.
        let fake = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let op = wire::read_op(&mut stream).await.unwrap();
            assert_eq!(op, OP_DOWNLOAD);
            let _name = wire::read_name(&mut stream).await.unwrap();

            wire::write_download_reply(&mut stream, &DownloadReply::Accepted)
                .await
                .unwrap();
            let metadata = TransferMetadata {
                filename: "lie.bin".into(),
                size: 999,
                timestamp: String::new(),
            };
            wire::write_metadata(&mut stream, &metadata).await.unwrap();
            wire::write_chunk(&mut stream, b"ten bytes!").await.unwrap();
            wire::write_end_marker(&mut stream).await.unwrap();
            stream.flush().await.unwrap();
            // Hold the socket open until the client is done reading.
            let _ = stream.read_u8().await;
        });

        let dest = TempDir::new().unwrap();
        let client = FileClient::new(addr).with_limits(test_limits());
        let cancel = CancellationToken::new();
        let err = client
            .download("lie.bin", dest.path(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransferError::SizeMismatch {
                declared: 999,
                received: 10
            }
        ));

        fake.abort();
    }

    /// No chunk is processed before metadata: a stream that opens with
    /// chunk frames instead of a metadata block is rejected up front.
    #[tokio::test]
    async fn upload_without_metadata_rejected() {
        let fx = Fixture::start().await;

        let mut stream = tokio::net::TcpStream::connect(fx.addr).await.unwrap();
        wire::write_op(&mut stream, OP_UPLOAD).await.unwrap();
        // Empty metadata block: no filename, no size.
        stream.write_u16(0).await.unwrap();

        match wire::read_upload_reply(&mut stream).await.unwrap() {
            UploadReply::Rejected(reason) => assert!(reason.contains("filename")),
            other => panic!("expected rejection, got {other:?}"),
        }
        // The storage root stays empty.
        assert_eq!(std::fs::read_dir(fx.root.path()).unwrap().count(), 0);

        fx.stop().await;
    }

    #[tokio::test]
    async fn listing_is_idempotent() {
        let fx = Fixture::start().await;
        let client = fx.client();
        let cancel = CancellationToken::new();

        for (name, len) in [("a.bin", 10usize), ("b.bin", 0), ("c.bin", 5000)] {
            let src = fx.write_local(name, &vec![1u8; len]);
            client.upload(&src, &cancel).await.unwrap();
        }

        let first = client.list(&cancel).await.unwrap();
        let second = client.list(&cancel).await.unwrap();

        let names_sizes =
            |files: &[fileshelf_protocol::FileDescriptor]| -> Vec<(String, u64)> {
                files.iter().map(|f| (f.name.clone(), f.size)).collect()
            };
        assert_eq!(names_sizes(&first), names_sizes(&second));
        assert_eq!(
            names_sizes(&first),
            vec![
                ("a.bin".to_string(), 10),
                ("b.bin".to_string(), 0),
                ("c.bin".to_string(), 5000)
            ]
        );

        fx.stop().await;
    }

    /// Two uploads of the same name race; the per-file lock serializes
    /// them so the stored file is one payload in full, never a mix.
    #[tokio::test]
    async fn concurrent_same_name_uploads_serialize() {
        let fx = Fixture::start().await;
        let cancel = CancellationToken::new();

        let data_a = vec![0xAAu8; FRAME_CAP * 3];
        let data_b = vec![0xBBu8; FRAME_CAP * 3 + 100];
        let src_a = fx.write_local("same.bin", &data_a);
        let dir_b = TempDir::new().unwrap();
        let src_b = dir_b.path().join("same.bin");
        std::fs::write(&src_b, &data_b).unwrap();

        let client_a = fx.client();
        let client_b = fx.client();
        let (ca, cb) = (cancel.clone(), cancel.clone());
        let (ra, rb) = tokio::join!(
            client_a.upload(&src_a, &ca),
            client_b.upload(&src_b, &cb)
        );
        assert!(ra.unwrap().is_ok());
        assert!(rb.unwrap().is_ok());

        let stored = std::fs::read(fx.root.path().join("same.bin")).unwrap();
        assert!(
            stored == data_a || stored == data_b,
            "stored file must be exactly one of the two payloads"
        );

        fx.stop().await;
    }

    #[tokio::test]
    async fn download_missing_file_is_not_found() {
        let fx = Fixture::start().await;
        let client = fx.client();
        let cancel = CancellationToken::new();

        let dest = TempDir::new().unwrap();
        let err = client
            .download("missing.bin", dest.path(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::NotFound(_)));

        fx.stop().await;
    }

    #[tokio::test]
    async fn oversized_chunk_frame_aborts_upload() {
        let fx = Fixture::start().await;

        let mut stream = tokio::net::TcpStream::connect(fx.addr).await.unwrap();
        wire::write_op(&mut stream, OP_UPLOAD).await.unwrap();
        let metadata = TransferMetadata {
            filename: "fat.bin".into(),
            size: (FRAME_CAP * 2) as u64,
            timestamp: String::new(),
        };
        wire::write_metadata(&mut stream, &metadata).await.unwrap();
        // One frame over the server's cap: the transfer aborts with no
        // status reply and the connection closes.
        wire::write_chunk(&mut stream, &vec![0u8; FRAME_CAP * 2])
            .await
            .unwrap();
        wire::write_end_marker(&mut stream).await.unwrap();

        let mut buf = [0u8; 1];
        let n = stream.read(&mut buf).await.unwrap_or(0);
        assert_eq!(n, 0, "server should close without a status byte");

        fx.stop().await;
    }

    /// Uploading into an occupied name replaces the stored content.
    #[tokio::test]
    async fn reupload_replaces_content() {
        let fx = Fixture::start().await;
        let client = fx.client();
        let cancel = CancellationToken::new();

        let first = fx.write_local("doc.txt", b"first version, longer");
        client.upload(&first, &cancel).await.unwrap();
        std::fs::write(&first, b"second").unwrap();
        client.upload(&first, &cancel).await.unwrap();

        assert_eq!(
            std::fs::read(fx.root.path().join("doc.txt")).unwrap(),
            b"second"
        );

        fx.stop().await;
    }

    /// A pre-cancelled token stops the transfer before any bytes move.
    #[tokio::test]
    async fn cancelled_upload_never_reaches_storage() {
        let fx = Fixture::start().await;
        let client = fx.client();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let src = fx.write_local("never.bin", &[7u8; 100]);
        let err = client.upload(&src, &cancel).await.unwrap_err();
        assert!(matches!(err, TransferError::Cancelled));
        assert!(!fx.root.path().join("never.bin").exists());

        fx.stop().await;
    }
}
