//! IPC protocol messages for generator worker processes.
//!
//! Uses length-prefixed rkyv messages over stdin/stdout.
//! Format: 4-byte length (u32 LE) + rkyv-encoded message.

use std::io::{Read, Write};

use rkyv::{Archive, Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::generator::GenerationRequest;

/// Largest message either side accepts (64MB).
const MAX_MESSAGE_LEN: usize = 64 * 1024 * 1024;

/// Command sent from the host to a worker process.
#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
pub enum WorkerCommand {
    /// Ping to check if worker is alive.
    Ping,

    /// Ask the worker which generator version it runs.
    Handshake,

    /// Generate the test body for one feature file.
    Generate {
        request: GenerationRequest,
    },

    /// Shutdown the worker process gracefully.
    Shutdown,
}

/// Response sent from a worker to the host.
#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
pub enum WorkerResponse {
    /// Response to Ping command.
    Pong,

    /// Response to Handshake.
    Ready {
        /// Generator version as a semver string.
        version: String,
    },

    /// Generation succeeded.
    Generated {
        code: String,
    },

    /// Generation failed.
    Error {
        message: String,
        /// Feature file line the error refers to.
        line: Option<u64>,
    },

    /// The generator panicked.
    Panic {
        message: String,
    },

    /// Acknowledgement of shutdown request.
    ShuttingDown,
}

/// Write a message to a writer using length-prefixed rkyv encoding.
pub fn write_message<W: Write>(
    writer: &mut W,
    message: &impl for<'a> Serialize<
        rkyv::rancor::Strategy<
            rkyv::ser::Serializer<
                rkyv::util::AlignedVec,
                rkyv::ser::allocator::ArenaHandle<'a>,
                rkyv::ser::sharing::Share,
            >,
            rkyv::rancor::Error,
        >,
    >,
) -> Result<()> {
    let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(message)
        .map_err(|e| Error::Serialization(format!("Failed to encode IPC message: {}", e)))?;

    let len = bytes.len() as u32;
    writer
        .write_all(&len.to_le_bytes())
        .map_err(|e| Error::Ipc(format!("Failed to write IPC message length: {}", e)))?;
    writer
        .write_all(&bytes)
        .map_err(|e| Error::Ipc(format!("Failed to write IPC message body: {}", e)))?;
    writer
        .flush()
        .map_err(|e| Error::Ipc(format!("Failed to flush IPC stream: {}", e)))?;

    Ok(())
}

/// Read a message from a reader using length-prefixed rkyv encoding.
///
/// # Safety
///
/// Uses unchecked deserialization. Only safe when reading from our own
/// worker processes, which are located and version-checked by the host.
pub fn read_message<R: Read, T>(reader: &mut R) -> Result<T>
where
    T: Archive,
    T::Archived: Deserialize<T, rkyv::rancor::Strategy<rkyv::de::Pool, rkyv::rancor::Error>>,
{
    let mut len_bytes = [0u8; 4];
    reader
        .read_exact(&mut len_bytes)
        .map_err(|e| Error::Ipc(format!("Failed to read IPC message length: {}", e)))?;
    let len = u32::from_le_bytes(len_bytes) as usize;

    if len > MAX_MESSAGE_LEN {
        return Err(Error::Ipc(format!("IPC message too large: {} bytes", len)));
    }

    // rkyv needs aligned input
    let mut bytes = rkyv::util::AlignedVec::<16>::with_capacity(len);
    bytes.resize(len, 0);
    reader
        .read_exact(&mut bytes)
        .map_err(|e| Error::Ipc(format!("Failed to read IPC message body: {}", e)))?;

    // SAFETY: messages come from our own worker or host process.
    let message = unsafe { rkyv::from_bytes_unchecked::<T, rkyv::rancor::Error>(&bytes) }
        .map_err(|e| Error::Serialization(format!("Failed to decode IPC message: {}", e)))?;

    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectPlatformSettings;
    use crate::generator::EmitContext;
    use std::io::Cursor;

    #[test]
    fn test_generate_command_roundtrip() {
        let cmd = WorkerCommand::Generate {
            request: GenerationRequest {
                feature_content: "Feature: X\n".to_string(),
                context: EmitContext {
                    source_file: "Specs/X.feature".to_string(),
                    folder_path: "Specs".to_string(),
                    platform: ProjectPlatformSettings::default(),
                },
            },
        };

        let mut buf = Vec::new();
        write_message(&mut buf, &cmd).unwrap();

        let mut cursor = Cursor::new(buf);
        let decoded: WorkerCommand = read_message(&mut cursor).unwrap();

        match decoded {
            WorkerCommand::Generate { request } => {
                assert_eq!(request.feature_content, "Feature: X\n");
                assert_eq!(request.context.folder_path, "Specs");
            }
            _ => panic!("Wrong command type"),
        }
    }

    #[test]
    fn test_error_response_keeps_line() {
        let resp = WorkerResponse::Error {
            message: "bad step".to_string(),
            line: Some(7),
        };

        let mut buf = Vec::new();
        write_message(&mut buf, &resp).unwrap();

        let decoded: WorkerResponse = read_message(&mut Cursor::new(buf)).unwrap();
        assert!(matches!(decoded, WorkerResponse::Error { line: Some(7), .. }));
    }

    #[test]
    fn test_truncated_stream_is_ipc_error() {
        let mut buf = Vec::new();
        write_message(&mut buf, &WorkerCommand::Handshake).unwrap();
        buf.truncate(buf.len() - 1);

        let result: Result<WorkerCommand> = read_message(&mut Cursor::new(buf));
        assert!(matches!(result, Err(Error::Ipc(_))));
    }

    #[test]
    fn test_oversized_length_is_rejected() {
        let buf = (u32::MAX).to_le_bytes().to_vec();
        let result: Result<WorkerResponse> = read_message(&mut Cursor::new(buf));
        assert!(matches!(result, Err(Error::Ipc(msg)) if msg.contains("too large")));
    }
}
