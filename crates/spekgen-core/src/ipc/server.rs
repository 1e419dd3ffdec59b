//! Worker side of the IPC protocol.

use std::io::{Read, Write};
use std::panic::{self, AssertUnwindSafe};

use crate::error::{Error, Result};
use crate::generator::TestGenerator;

use super::protocol::{WorkerCommand, WorkerResponse, read_message, write_message};

/// Answer commands from `reader` until `Shutdown` or end of input.
///
/// Generation errors and panics are reported to the host as responses;
/// only broken streams end the loop with an error.
pub fn serve<R: Read, W: Write>(reader: &mut R, writer: &mut W, generator: &dyn TestGenerator) -> Result<()> {
    loop {
        let command: WorkerCommand = match read_message(reader) {
            Ok(command) => command,
            Err(Error::Ipc(msg)) if msg.contains("length") => {
                // Host closed the pipe between messages.
                tracing::debug!("Input closed, exiting");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let response = match command {
            WorkerCommand::Ping => WorkerResponse::Pong,
            WorkerCommand::Handshake => WorkerResponse::Ready {
                version: generator.version().to_string(),
            },
            WorkerCommand::Generate { request } => {
                tracing::debug!("Generating {}", request.context.source_file);
                match panic::catch_unwind(AssertUnwindSafe(|| generator.generate(&request))) {
                    Ok(Ok(code)) => WorkerResponse::Generated { code },
                    Ok(Err(e)) => WorkerResponse::Error {
                        line: e.line().map(|l| l as u64),
                        message: e.to_string(),
                    },
                    Err(payload) => WorkerResponse::Panic {
                        message: panic_message(payload.as_ref()),
                    },
                }
            }
            WorkerCommand::Shutdown => {
                write_message(writer, &WorkerResponse::ShuttingDown)?;
                return Ok(());
            }
        };

        write_message(writer, &response)?;
    }
}

/// Text of a panic payload caught with `catch_unwind`.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectPlatformSettings;
    use crate::generator::{BuiltinGenerator, EmitContext, GenerationRequest};
    use semver::Version;
    use std::io::Cursor;

    struct PanickingGenerator;

    impl TestGenerator for PanickingGenerator {
        fn version(&self) -> Version {
            Version::new(0, 1, 0)
        }

        fn generate(&self, _request: &GenerationRequest) -> Result<String> {
            panic!("emitter bug")
        }
    }

    fn generate(content: &str) -> WorkerCommand {
        WorkerCommand::Generate {
            request: GenerationRequest {
                feature_content: content.to_string(),
                context: EmitContext {
                    source_file: "A.feature".to_string(),
                    folder_path: String::new(),
                    platform: ProjectPlatformSettings::default(),
                },
            },
        }
    }

    fn run(commands: &[WorkerCommand], generator: &dyn TestGenerator) -> Vec<WorkerResponse> {
        let mut input = Vec::new();
        for cmd in commands {
            write_message(&mut input, cmd).unwrap();
        }
        let mut output = Vec::new();
        serve(&mut Cursor::new(input), &mut output, generator).unwrap();

        let mut cursor = Cursor::new(output);
        let mut responses = Vec::new();
        while (cursor.position() as usize) < cursor.get_ref().len() {
            responses.push(read_message(&mut cursor).unwrap());
        }
        responses
    }

    #[test]
    fn test_serve_session() {
        let responses = run(
            &[
                WorkerCommand::Ping,
                WorkerCommand::Handshake,
                generate("Feature: A\nScenario: B\n  Given c\n"),
                generate("nonsense"),
                WorkerCommand::Shutdown,
            ],
            &BuiltinGenerator::new(),
        );

        assert_eq!(responses.len(), 5);
        assert!(matches!(responses[0], WorkerResponse::Pong));
        assert!(matches!(&responses[1], WorkerResponse::Ready { version } if version == env!("CARGO_PKG_VERSION")));
        assert!(matches!(&responses[2], WorkerResponse::Generated { code } if code.contains("AFeature")));
        assert!(matches!(responses[3], WorkerResponse::Error { line: Some(1), .. }));
        assert!(matches!(responses[4], WorkerResponse::ShuttingDown));
    }

    #[test]
    fn test_serve_ends_on_closed_input() {
        let responses = run(&[WorkerCommand::Ping], &BuiltinGenerator::new());
        assert_eq!(responses.len(), 1);
    }

    #[test]
    fn test_serve_reports_panics() {
        let responses = run(&[generate("Feature: A")], &PanickingGenerator);
        assert!(matches!(&responses[0], WorkerResponse::Panic { message } if message == "emitter bug"));
    }
}
