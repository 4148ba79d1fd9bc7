// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT
use crate::config::{CarConfig, DEFAULT_MAX_FRAME_LEN};
use crate::error::Error;
use crate::utils::multihash::{cid_v1, verify_cid};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use cid::Cid;
use futures::ready;
use futures::{Stream, StreamExt, sink::Sink};
use fvm_ipld_encoding::{DAG_CBOR, IPLD_RAW};
use pin_project_lite::pin_project;
use serde::{Deserialize, Serialize};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Decoder, Encoder, FramedRead};

/// The only CAR version this codec reads and writes.
pub const CAR_VERSION: u64 = 1;

/// <https://ipld.io/specs/transport/car/carv1/#header>
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CarHeader {
    // Field order matches the canonical DAG-CBOR key order.
    pub roots: Vec<Cid>,
    pub version: u64,
}

impl CarHeader {
    pub fn new(roots: Vec<Cid>) -> Self {
        Self {
            roots,
            version: CAR_VERSION,
        }
    }

    /// Encodes the header as a DAG-CBOR record prefixed with its varint length.
    pub fn encode(&self) -> Result<Bytes, Error> {
        let record = serde_ipld_dagcbor::to_vec(self).map_err(|e| Error::Encoding(e.to_string()))?;
        let mut frame = BytesMut::with_capacity(record.len() + 2);
        CarFrameCodec::default().encode(Bytes::from(record), &mut frame)?;
        Ok(frame.freeze())
    }

    /// Decodes an un-prefixed header record.
    pub fn decode(record: &[u8]) -> Result<Self, Error> {
        let header: CarHeader = serde_ipld_dagcbor::from_slice(record)
            .map_err(|e| Error::MalformedHeader(e.to_string()))?;
        if header.version != CAR_VERSION {
            return Err(Error::MalformedHeader(format!(
                "CAR file version must be {CAR_VERSION}, found {}",
                header.version
            )));
        }
        Ok(header)
    }

    /// Writes header and stream of blocks to writer in CAR format, preserving
    /// the order of the stream.
    pub async fn write_stream_async<W, S>(&self, writer: W, stream: S) -> Result<(), Error>
    where
        W: AsyncWrite + Unpin,
        S: Stream<Item = Result<CarBlock, Error>>,
    {
        stream.forward(CarWriter::new(self.clone(), writer)?).await
    }
}

impl From<Vec<Cid>> for CarHeader {
    fn from(roots: Vec<Cid>) -> Self {
        Self::new(roots)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CarBlock {
    pub cid: Cid,
    pub data: Vec<u8>,
}

impl CarBlock {
    /// Raw leaf block keyed by a BLAKE2b-256 CID.
    pub fn raw(data: impl Into<Vec<u8>>) -> CarBlock {
        let data = data.into();
        CarBlock {
            cid: cid_v1(IPLD_RAW, &data),
            data,
        }
    }

    /// DAG-CBOR block keyed by a BLAKE2b-256 CID.
    pub fn dag_cbor<T: Serialize>(value: &T) -> Result<CarBlock, Error> {
        let data = serde_ipld_dagcbor::to_vec(value).map_err(|e| Error::Encoding(e.to_string()))?;
        Ok(CarBlock {
            cid: cid_v1(DAG_CBOR, &data),
            data,
        })
    }

    /// Length of the frame body, i.e. the value of the varint prefix.
    pub fn frame_length(&self) -> usize {
        self.cid.encoded_len() + self.data.len()
    }

    // Write a varint frame containing the cid and the data
    pub fn write(&self, mut writer: &mut impl io::Write) -> io::Result<()> {
        let mut prefix = unsigned_varint::encode::usize_buffer();
        writer.write_all(unsigned_varint::encode::usize(
            self.frame_length(),
            &mut prefix,
        ))?;
        #[allow(clippy::needless_borrows_for_generic_args)]
        self.cid
            .write_bytes(&mut writer)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writer.write_all(&self.data)?;
        Ok(())
    }

    /// Encodes the block as one varint-prefixed frame.
    pub fn encode(&self) -> io::Result<Bytes> {
        let mut frame = BytesMut::with_capacity(self.frame_length() + 4).writer();
        self.write(&mut frame)?;
        Ok(frame.into_inner().freeze())
    }

    /// Splits a frame body into its CID and payload.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Result<CarBlock, Error> {
        let bytes: Bytes = bytes.into();
        let mut cursor = bytes.reader();
        let cid = Cid::read_bytes(&mut cursor).map_err(|e| Error::MalformedCid(e.to_string()))?;
        let bytes = cursor.into_inner();
        Ok(CarBlock {
            cid,
            data: bytes.to_vec(),
        })
    }

    pub fn valid(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn validate(&self) -> Result<(), Error> {
        verify_cid(&self.cid, &self.data)
    }
}

/// Unsigned-varint length-delimited frames, as used by both the CAR header and
/// every block. Unlike [`unsigned_varint::codec::UviBytes`] the length prefix is
/// only consumed once the whole frame is buffered, so a short read at the end
/// of the input can be reported with the declared length.
#[derive(Debug, Clone, Copy)]
pub struct CarFrameCodec {
    max_frame_len: usize,
}

impl Default for CarFrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LEN)
    }
}

impl CarFrameCodec {
    pub fn new(max_frame_len: usize) -> Self {
        Self { max_frame_len }
    }
}

impl Decoder for CarFrameCodec {
    type Item = BytesMut;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<BytesMut>, Error> {
        let (frame_len, prefix_len) = match unsigned_varint::decode::usize(src) {
            Ok((frame_len, rest)) => (frame_len, src.len() - rest.len()),
            Err(unsigned_varint::decode::Error::Insufficient) => return Ok(None),
            Err(e) => return Err(Error::MalformedFrame(e.to_string())),
        };
        if frame_len > self.max_frame_len {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "frame of {frame_len} bytes exceeds the limit of {} bytes",
                    self.max_frame_len
                ),
            )
            .into());
        }
        let total = prefix_len + frame_len;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }
        src.advance(prefix_len);
        Ok(Some(src.split_to(frame_len)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<BytesMut>, Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(truncated_frame(src)),
        }
    }
}

impl Encoder<Bytes> for CarFrameCodec {
    type Error = Error;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Error> {
        let mut prefix = unsigned_varint::encode::usize_buffer();
        let prefix = unsigned_varint::encode::usize(item.len(), &mut prefix);
        dst.reserve(prefix.len() + item.len());
        dst.put_slice(prefix);
        dst.put(item);
        Ok(())
    }
}

fn truncated_frame(remaining: &[u8]) -> Error {
    match unsigned_varint::decode::usize(remaining) {
        Ok((frame_len, body)) => Error::TruncatedBlock(format!(
            "frame declares {frame_len} bytes but only {} remain",
            body.len()
        )),
        Err(_) => Error::TruncatedBlock(format!(
            "incomplete length prefix ({} bytes)",
            remaining.len()
        )),
    }
}

pin_project! {
    /// Forward-only stream of CAR blocks. The header is parsed eagerly by
    /// [`CarStream::new`]; blocks are decoded one frame at a time.
    pub struct CarStream<ReaderT> {
        #[pin]
        reader: FramedRead<ReaderT, CarFrameCodec>,
        pub header: CarHeader,
        verify_cids: bool,
    }
}

impl<ReaderT: AsyncRead + Unpin> CarStream<ReaderT> {
    pub async fn new(reader: ReaderT) -> Result<Self, Error> {
        Self::with_config(reader, &CarConfig::default()).await
    }

    pub async fn with_config(reader: ReaderT, config: &CarConfig) -> Result<Self, Error> {
        let mut reader = FramedRead::new(reader, CarFrameCodec::new(config.max_frame_len));
        let header = read_v1_header(&mut reader).await?;
        Ok(CarStream {
            reader,
            header,
            verify_cids: config.verify_cids,
        })
    }
}

impl<ReaderT> CarStream<ReaderT> {
    pub fn roots(&self) -> &[Cid] {
        &self.header.roots
    }
}

impl<ReaderT: AsyncRead> Stream for CarStream<ReaderT> {
    type Item = Result<CarBlock, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let verify_cids = *this.verify_cids;
        let item = ready!(this.reader.poll_next(cx));
        Poll::Ready(item.map(|frame| {
            let block = CarBlock::from_bytes(frame?.freeze())?;
            if verify_cids {
                block.validate()?;
            }
            Ok(block)
        }))
    }
}

pin_project! {
    pub struct CarWriter<W> {
        #[pin]
        inner: W,
        buffer: BytesMut,
    }
}

impl<W: AsyncWrite> CarWriter<W> {
    pub fn new_carv1(roots: Vec<Cid>, writer: W) -> Result<Self, Error> {
        Self::new(CarHeader::new(roots), writer)
    }

    /// The header is written before the first block, or on flush.
    pub fn new(header: CarHeader, writer: W) -> Result<Self, Error> {
        Ok(Self {
            inner: writer,
            buffer: BytesMut::from(header.encode()?.as_ref()),
        })
    }
}

impl<W: AsyncWrite> Sink<CarBlock> for CarWriter<W> {
    type Error = Error;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        let mut this = self.as_mut().project();

        while !this.buffer.is_empty() {
            this = self.as_mut().project();
            let bytes_written = ready!(this.inner.poll_write(cx, this.buffer))?;
            if bytes_written == 0 {
                return Poll::Ready(Err(io::Error::from(io::ErrorKind::WriteZero).into()));
            }
            this.buffer.advance(bytes_written);
        }
        Poll::Ready(Ok(()))
    }
    fn start_send(self: Pin<&mut Self>, item: CarBlock) -> Result<(), Self::Error> {
        item.write(&mut self.project().buffer.writer())?;
        Ok(())
    }
    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        ready!(self.as_mut().poll_ready(cx))?;
        Poll::Ready(Ok(ready!(self.project().inner.poll_flush(cx))?))
    }
    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        ready!(self.as_mut().poll_ready(cx))?;
        Poll::Ready(Ok(ready!(self.project().inner.poll_shutdown(cx))?))
    }
}

async fn read_v1_header<ReaderT: AsyncRead + Unpin>(
    framed_reader: &mut FramedRead<ReaderT, CarFrameCodec>,
) -> Result<CarHeader, Error> {
    match framed_reader.next().await {
        None => Err(Error::EmptyArchive),
        Some(Err(Error::TruncatedBlock(reason) | Error::MalformedFrame(reason))) => {
            Err(Error::MalformedHeader(reason))
        }
        Some(Err(e)) => Err(e),
        Some(Ok(frame)) => CarHeader::decode(&frame),
    }
}
