//! Wire protocol shared by the paroliere server and client.
//!
//! Every message travels as a frame: a one-byte kind tag, a four-byte
//! big-endian payload length, then exactly that many payload bytes. The
//! length field doubles as the transport-level prefix, so a reader always
//! knows how many more bytes to await after a partial read.

use bincode::Options;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const MATRIX_SIZE: usize = 4;
pub const MIN_WORD_LEN: usize = 4;
pub const MAX_WORD_LEN: usize = 16;
pub const MAX_NICKNAME_LEN: usize = 10;

/// Size of the fixed frame header: kind tag plus payload length.
pub const HEADER_LEN: usize = 5;

/// Upper bound on a payload. Guards allocation against bogus length fields.
pub const MAX_PAYLOAD_SIZE: u32 = 64 * 1024;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame header needs {HEADER_LEN} bytes, only {available} available")]
    TruncatedHeader { available: usize },
    #[error("payload declares {declared} bytes, only {available} available")]
    TruncatedPayload { declared: u32, available: usize },
    #[error("unknown message kind 0x{0:02x}")]
    UnknownKind(u8),
    #[error("payload of {0} bytes exceeds the {MAX_PAYLOAD_SIZE} byte limit")]
    Oversized(u32),
    #[error("header codec: {0}")]
    Header(#[from] bincode::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Kind tag carried in the first byte of every frame.
///
/// `Matrix` is used in both directions: an empty client request asks for
/// the current grid, a server frame carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    Ok = b'K',
    Error = b'E',
    RegisterUser = b'R',
    Matrix = b'M',
    TimeInRound = b'T',
    TimeToNextRound = b'A',
    SubmitWord = b'W',
    FinalScores = b'F',
    WordScore = b'P',
}

impl MessageKind {
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Result<Self, FrameError> {
        let kind = match tag {
            b'K' => MessageKind::Ok,
            b'E' => MessageKind::Error,
            b'R' => MessageKind::RegisterUser,
            b'M' => MessageKind::Matrix,
            b'T' => MessageKind::TimeInRound,
            b'A' => MessageKind::TimeToNextRound,
            b'W' => MessageKind::SubmitWord,
            b'F' => MessageKind::FinalScores,
            b'P' => MessageKind::WordScore,
            other => return Err(FrameError::UnknownKind(other)),
        };
        Ok(kind)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FrameHeader {
    kind: u8,
    size: u32,
}

fn header_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_big_endian()
        .allow_trailing_bytes()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(kind: MessageKind, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    pub fn empty(kind: MessageKind) -> Self {
        Self::new(kind, Vec::new())
    }

    pub fn text(kind: MessageKind, text: &str) -> Self {
        Self::new(kind, text.as_bytes())
    }

    /// Payload as text, replacing invalid UTF-8 sequences.
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }

    /// Total number of bytes this message occupies on the wire.
    pub fn frame_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }

    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        let size = u32::try_from(self.payload.len())
            .map_err(|_| FrameError::Oversized(u32::MAX))?;
        if size > MAX_PAYLOAD_SIZE {
            return Err(FrameError::Oversized(size));
        }

        let header = FrameHeader {
            kind: self.kind.tag(),
            size,
        };
        let mut bytes = header_options().serialize(&header)?;
        bytes.extend_from_slice(&self.payload);
        Ok(bytes)
    }

    /// Decodes the frame at the front of `bytes`. Bytes past the declared
    /// payload are left for the next frame.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let size = parse_header_size(bytes)?;
        let kind = MessageKind::from_tag(bytes[0])?;
        let available = bytes.len() - HEADER_LEN;
        if size as usize > available {
            return Err(FrameError::TruncatedPayload {
                declared: size,
                available,
            });
        }

        Ok(Self {
            kind,
            payload: bytes[HEADER_LEN..HEADER_LEN + size as usize].to_vec(),
        })
    }
}

fn parse_header_size(bytes: &[u8]) -> Result<u32, FrameError> {
    if bytes.len() < HEADER_LEN {
        return Err(FrameError::TruncatedHeader {
            available: bytes.len(),
        });
    }
    let header: FrameHeader = header_options().deserialize(&bytes[..HEADER_LEN])?;
    Ok(header.size)
}

/// Reads one frame from a stream.
///
/// Returns `Ok(None)` when the peer closes the stream cleanly between
/// frames. A close in the middle of a frame is an error.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<Message>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    if reader.read(&mut header[..1]).await? == 0 {
        return Ok(None);
    }
    reader.read_exact(&mut header[1..]).await?;

    let size = parse_header_size(&header)?;
    let kind = MessageKind::from_tag(header[0])?;
    if size > MAX_PAYLOAD_SIZE {
        return Err(FrameError::Oversized(size));
    }

    let mut payload = vec![0u8; size as usize];
    reader.read_exact(&mut payload).await?;
    Ok(Some(Message { kind, payload }))
}

pub async fn write_message<W>(writer: &mut W, message: &Message) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let bytes = message.encode()?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// One line of the final scoreboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreEntry {
    pub nickname: String,
    pub score: u32,
}

impl ScoreEntry {
    pub fn new(nickname: impl Into<String>, score: u32) -> Self {
        Self {
            nickname: nickname.into(),
            score,
        }
    }
}

impl fmt::Display for ScoreEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},", self.nickname, self.score)
    }
}

/// Renders a ranked scoreboard as repeated `name,score,` pairs.
pub fn format_scoreboard(entries: &[ScoreEntry]) -> String {
    entries.iter().map(ScoreEntry::to_string).collect()
}

/// Parses a scoreboard payload. Returns `None` on a dangling name or a
/// score that is not a number.
pub fn parse_scoreboard(text: &str) -> Option<Vec<ScoreEntry>> {
    let mut fields = text.split(',').filter(|field| !field.is_empty());
    let mut entries = Vec::new();
    while let Some(nickname) = fields.next() {
        let score = fields.next()?.trim().parse().ok()?;
        entries.push(ScoreEntry::new(nickname, score));
    }
    Some(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[test]
    fn test_encode_layout() {
        let message = Message::text(MessageKind::SubmitWord, "piano");
        let bytes = message.encode().unwrap();

        assert_eq!(bytes.len(), message.frame_len());
        assert_eq!(bytes[0], b'W');
        assert_eq!(&bytes[1..5], &[0, 0, 0, 5]);
        assert_eq!(&bytes[5..], b"piano");
    }

    #[test]
    fn test_decode_is_inverse_of_encode() {
        let message = Message::text(MessageKind::FinalScores, "ana,12,bob,7,");
        let decoded = Message::decode(&message.encode().unwrap()).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_decode_empty_payload() {
        let message = Message::empty(MessageKind::Matrix);
        let bytes = message.encode().unwrap();
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(Message::decode(&bytes).unwrap(), message);
    }

    #[test]
    fn test_decode_short_header() {
        let result = Message::decode(&[b'K', 0, 0]);
        assert!(matches!(
            result,
            Err(FrameError::TruncatedHeader { available: 3 })
        ));
    }

    #[test]
    fn test_decode_size_exceeds_buffer() {
        let mut bytes = Message::text(MessageKind::Ok, "Game joined").encode().unwrap();
        bytes.truncate(8);

        match Message::decode(&bytes) {
            Err(FrameError::TruncatedPayload {
                declared,
                available,
            }) => {
                assert_eq!(declared, 11);
                assert_eq!(available, 3);
            }
            other => panic!("expected truncated payload, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_unknown_kind() {
        let bytes = [b'Z', 0, 0, 0, 0];
        assert!(matches!(
            Message::decode(&bytes),
            Err(FrameError::UnknownKind(b'Z'))
        ));
    }

    #[test]
    fn test_decode_leaves_trailing_frame() {
        let first = Message::text(MessageKind::WordScore, "5");
        let second = Message::text(MessageKind::WordScore, "0");
        let mut bytes = first.encode().unwrap();
        bytes.extend(second.encode().unwrap());

        assert_eq!(Message::decode(&bytes).unwrap(), first);
        assert_eq!(Message::decode(&bytes[first.frame_len()..]).unwrap(), second);
    }

    #[test]
    fn test_kind_tags_match_wire_bytes() {
        let kinds = [
            MessageKind::Ok,
            MessageKind::Error,
            MessageKind::RegisterUser,
            MessageKind::Matrix,
            MessageKind::TimeInRound,
            MessageKind::TimeToNextRound,
            MessageKind::SubmitWord,
            MessageKind::FinalScores,
            MessageKind::WordScore,
        ];
        for kind in kinds {
            assert_eq!(MessageKind::from_tag(kind.tag()).unwrap(), kind);
        }
        assert_eq!(MessageKind::TimeToNextRound.tag(), b'A');
    }

    #[test]
    fn test_read_message_across_partial_reads() {
        let bytes = Message::text(MessageKind::RegisterUser, "ana").encode().unwrap();
        let mut stream = Builder::new()
            .read(&bytes[..2])
            .read(&bytes[2..6])
            .read(&bytes[6..])
            .build();

        let message = tokio_test::block_on(read_message(&mut stream)).unwrap();
        assert_eq!(message, Some(Message::text(MessageKind::RegisterUser, "ana")));
    }

    #[test]
    fn test_read_message_clean_close() {
        let mut stream = Builder::new().build();
        let message = tokio_test::block_on(read_message(&mut stream)).unwrap();
        assert!(message.is_none());
    }

    #[test]
    fn test_read_message_close_mid_payload() {
        let bytes = Message::text(MessageKind::SubmitWord, "quota").encode().unwrap();
        let mut stream = Builder::new().read(&bytes[..7]).build();

        let result = tokio_test::block_on(read_message(&mut stream));
        assert!(matches!(result, Err(FrameError::Io(_))));
    }

    #[test]
    fn test_read_message_rejects_oversized() {
        let mut bytes = vec![b'W'];
        bytes.extend_from_slice(&(MAX_PAYLOAD_SIZE + 1).to_be_bytes());
        let mut stream = Builder::new().read(&bytes).build();

        let result = tokio_test::block_on(read_message(&mut stream));
        assert!(matches!(result, Err(FrameError::Oversized(_))));
    }

    #[test]
    fn test_write_message_emits_frame() {
        let message = Message::text(MessageKind::TimeInRound, "42");
        let expected = message.encode().unwrap();
        let mut stream = Builder::new().write(&expected).build();

        tokio_test::block_on(write_message(&mut stream, &message)).unwrap();
    }

    #[test]
    fn test_scoreboard_format() {
        let entries = vec![ScoreEntry::new("ana", 12), ScoreEntry::new("bob", 7)];
        assert_eq!(format_scoreboard(&entries), "ana,12,bob,7,");
        assert_eq!(format_scoreboard(&[]), "");
    }

    #[test]
    fn test_scoreboard_parse() {
        let entries = parse_scoreboard("ana,12,bob,7,").unwrap();
        assert_eq!(
            entries,
            vec![ScoreEntry::new("ana", 12), ScoreEntry::new("bob", 7)]
        );
        assert_eq!(parse_scoreboard("").unwrap(), vec![]);
        assert!(parse_scoreboard("ana,").is_none());
        assert!(parse_scoreboard("ana,lots,").is_none());
    }
}
