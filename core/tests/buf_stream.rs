use duplex_rpc_core::io::*;
use rand::{Rng, RngCore};
use std::future::Future;
use std::io;
use std::sync::{Arc, Mutex};

/// Hands out pre-split chunks, one per read call
#[derive(Debug)]
struct ChunkReader {
    chunks: Vec<Vec<u8>>,
    reads: Arc<Mutex<usize>>,
}

impl ChunkReader {
    fn new(chunks: Vec<Vec<u8>>) -> (Self, Arc<Mutex<usize>>) {
        let reads = Arc::new(Mutex::new(0));
        (Self { chunks, reads: reads.clone() }, reads)
    }
}

impl AsyncRead for ChunkReader {
    fn read(&mut self, buf: &mut [u8]) -> impl Future<Output = io::Result<usize>> + Send {
        async move {
            *self.reads.lock().unwrap() += 1;
            if self.chunks.is_empty() {
                return Ok(0);
            }
            let chunk = &mut self.chunks[0];
            let n = std::cmp::min(buf.len(), chunk.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            chunk.drain(..n);
            if chunk.is_empty() {
                self.chunks.remove(0);
            }
            Ok(n)
        }
    }
}

#[derive(Debug)]
struct SinkWriter {
    written: Arc<Mutex<Vec<u8>>>,
    short_writes: bool,
}

impl AsyncWrite for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> impl Future<Output = io::Result<usize>> + Send {
        async move {
            if buf.is_empty() {
                return Ok(0);
            }
            let n = if self.short_writes {
                let mut rng = rand::thread_rng();
                if rng.gen_bool(0.5) { rng.gen_range(1..=buf.len()) } else { buf.len() }
            } else {
                buf.len()
            };
            self.written.lock().unwrap().extend_from_slice(&buf[..n]);
            Ok(n)
        }
    }
}

fn frame_like_chunks(data: &[u8]) -> Vec<Vec<u8>> {
    let mut rng = rand::thread_rng();
    let mut chunks = Vec::new();
    let mut rest = data;
    while !rest.is_empty() {
        let size = rng.gen_range(1..128).min(rest.len());
        chunks.push(rest[..size].to_vec());
        rest = &rest[size..];
    }
    chunks
}

#[tokio::test]
async fn test_buf_reader_small_reads_share_one_fetch() {
    let data: Vec<u8> = (0..64u8).collect();
    let (inner, reads) = ChunkReader::new(vec![data.clone()]);
    let mut reader = AsyncBufReader::new(inner, 128);

    let mut head = [0u8; 16];
    reader.read_exact(&mut head).await.unwrap();
    assert_eq!(&head[..], &data[..16]);
    assert_eq!(reader.buffered(), 48);
    let mut body = vec![0u8; 48];
    reader.read_exact(&mut body).await.unwrap();
    assert_eq!(&body[..], &data[16..]);
    assert_eq!(*reads.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_buf_reader_bypass_large_read() {
    let data = vec![7u8; 300];
    let (inner, _reads) = ChunkReader::new(vec![data.clone()]);
    let mut reader = AsyncBufReader::new(inner, 64);
    let mut out = vec![0u8; 300];
    reader.read_exact(&mut out).await.unwrap();
    assert_eq!(out, data);
    assert_eq!(reader.buffered(), 0);
}

#[tokio::test]
async fn test_buf_reader_eof_mid_buffer() {
    let (inner, _reads) = ChunkReader::new(vec![vec![1u8; 10]]);
    let mut reader = AsyncBufReader::new(inner, 64);
    let mut out = vec![0u8; 16];
    let e = reader.read_exact(&mut out).await.unwrap_err();
    assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof);
}

#[tokio::test]
async fn test_buf_reader_random_chunks() {
    let mut rng = rand::thread_rng();
    let size = rng.gen_range(1024..4096);
    let mut data = vec![0u8; size];
    rng.fill_bytes(&mut data);
    let (inner, _reads) = ChunkReader::new(frame_like_chunks(&data));
    let mut reader = AsyncBufReader::new(inner, 256);

    let mut out = Vec::with_capacity(size);
    while out.len() < size {
        let want = rng.gen_range(1..=200).min(size - out.len());
        let mut piece = vec![0u8; want];
        reader.read_exact(&mut piece).await.unwrap();
        out.extend_from_slice(&piece);
    }
    assert_eq!(out, data);
}

#[tokio::test]
async fn test_buf_writer_holds_until_flush() {
    let written = Arc::new(Mutex::new(Vec::new()));
    let mut writer =
        AsyncBufWriter::new(SinkWriter { written: written.clone(), short_writes: false }, 8);

    writer.write_all(b"hello").await.unwrap();
    writer.write_all(b" wo").await.unwrap();
    assert!(written.lock().unwrap().is_empty());
    writer.write_all(b"rld").await.unwrap();
    assert_eq!(*written.lock().unwrap(), b"hello wo");
    writer.flush().await.unwrap();
    assert_eq!(*written.lock().unwrap(), b"hello world");
}

#[tokio::test]
async fn test_buf_writer_bypass_keeps_order() {
    let written = Arc::new(Mutex::new(Vec::new()));
    let mut writer =
        AsyncBufWriter::new(SinkWriter { written: written.clone(), short_writes: true }, 8);

    writer.write_all(b"abc").await.unwrap();
    assert!(written.lock().unwrap().is_empty());
    writer.write_all(b"this is a long line").await.unwrap();
    writer.flush().await.unwrap();
    assert_eq!(*written.lock().unwrap(), b"abcthis is a long line");
}
