//! Concrete codec adapter (C1): length-framed, bincode-encoded [`Record`]s
//! over any `AsyncRead + AsyncWrite` stream. Grounded on the same
//! `tokio_util::codec::LengthDelimitedCodec` + `tokio_serde` combination
//! this codebase already uses for its own framed IPC transports.

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_serde::Framed as SerdeFramed;
use tokio_serde::formats::Bincode;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use super::record::Record;
use crate::error::CodecError;

type InnerFramed<T> = SerdeFramed<Framed<T, LengthDelimitedCodec>, Record, Record, Bincode<Record, Record>>;

/// The read half of a split [`Transport`], owned by a connection's decoder
/// task.
pub struct DecodeHalf<T> {
  inner: SplitStream<InnerFramed<T>>,
}

/// The write half of a split [`Transport`], owned by a connection's encoder
/// task.
pub struct EncodeHalf<T> {
  inner: SplitSink<InnerFramed<T>, Record>,
}

impl<T> DecodeHalf<T>
where
  T: AsyncRead + AsyncWrite + Unpin,
{
  pub async fn decode(&mut self) -> Result<Option<Record>, CodecError> {
    match self.inner.next().await {
      Some(Ok(record)) => Ok(Some(record)),
      Some(Err(e)) => Err(CodecError::Decode(e.to_string())),
      None => Ok(None),
    }
  }
}

impl<T> EncodeHalf<T>
where
  T: AsyncRead + AsyncWrite + Unpin,
{
  pub async fn encode(&mut self, record: Record) -> Result<(), CodecError> {
    self
      .inner
      .send(record)
      .await
      .map_err(|e| CodecError::Encode(e.to_string()))
  }
}

/// One end of the framed wire protocol. Each live [`crate::connection::Connection`]
/// owns exactly one `Transport`, split into a decode half (used by the
/// decoder task) and an encode half (used by the encoder task) so both can
/// run concurrently without a shared lock.
pub struct Transport<T> {
  inner: InnerFramed<T>,
}

impl<T> Transport<T>
where
  T: AsyncRead + AsyncWrite + Unpin,
{
  pub fn new(io: T) -> Self {
    let length_delimited = Framed::new(io, LengthDelimitedCodec::new());
    let inner = SerdeFramed::new(length_delimited, Bincode::default());
    Self { inner }
  }

  /// Decode the next record on the stream, or `Ok(None)` on clean EOF.
  pub async fn decode(&mut self) -> Result<Option<Record>, CodecError> {
    match self.inner.next().await {
      Some(Ok(record)) => Ok(Some(record)),
      Some(Err(e)) => Err(CodecError::Decode(e.to_string())),
      None => Ok(None),
    }
  }

  /// Encode and flush one record onto the stream.
  pub async fn encode(&mut self, record: Record) -> Result<(), CodecError> {
    self
      .inner
      .send(record)
      .await
      .map_err(|e| CodecError::Encode(e.to_string()))
  }

  /// Split into independent decode/encode halves, each movable into its own task.
  pub fn split(self) -> (DecodeHalf<T>, EncodeHalf<T>) {
    let (sink, stream) = self.inner.split();
    (DecodeHalf { inner: stream }, EncodeHalf { inner: sink })
  }
}
