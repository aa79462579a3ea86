// src/router.rs

//! Command router: the single entry point for raw request documents.
//!
//! [`CommandRouter::execute`] never fails. Every input, well-formed or not,
//! produces exactly one serialized response document:
//!
//! - parse failures and foreign roots → `UnrecognizedDocument`,
//! - a missing command → `UndefinedCommand`,
//! - a missing or unknown client program → `Error_UndefinedProgram`,
//! - handler faults and panics → `UncaughtException` / `Error_CommandFailed`
//!   with the error chain in `details`.
//!
//! Parsing, classification, dispatch and response construction all happen
//! while holding the session's dispatch lock.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::catalog::{self, codes};
use crate::program::ClientProgram;
use crate::protocol::{
    Classification, CommandRequest, CommandResponse, CommandStatus, DEFAULT_ID, DocumentError,
    RequestDocument, sentinel,
};
use crate::session::{ServerSession, SessionState, catch_panic};

#[derive(Debug, Clone)]
pub struct CommandRouter {
    session: Arc<ServerSession>,
}

impl CommandRouter {
    pub fn new(session: Arc<ServerSession>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<ServerSession> {
        &self.session
    }

    /// Execute one raw request document and return the serialized response.
    pub async fn execute(&self, raw: &str) -> String {
        debug!(bytes = raw.len(), "request received");
        let response = self.respond(raw).await;

        info!(
            command = %response.command,
            id = %response.id,
            status = %response.status,
            "request handled"
        );
        response.to_document_string()
    }

    /// Same as [`Self::execute`], returning the structured response.
    ///
    /// Transcripts are written and, after a close request, the session log
    /// is released while the dispatch lock is still held.
    pub async fn respond(&self, raw: &str) -> CommandResponse {
        let mut state = self.session.lock().await;

        if let Some(log) = self.session.session_log() {
            log.note(&format!("Request: {raw}"));
        }
        let response = self.classify_and_dispatch(&mut state, raw);
        if let Some(log) = self.session.session_log() {
            log.note(&format!("Response: {}", response.to_document_string()));
        }
        if self.session.close_requested() {
            self.session.release_session_log();
        }

        drop(state);
        response
    }

    fn classify_and_dispatch(&self, state: &mut SessionState, raw: &str) -> CommandResponse {
        let document = match RequestDocument::parse(raw) {
            Ok(document) => document,
            Err(err) => return parse_failure(raw, &err),
        };

        let request = match document.classify() {
            Classification::Recognized(request) => request,
            Classification::UnrecognizedDocument { id } => {
                warn!(root = %document.root(), id = %id, "unrecognized document root");
                return CommandResponse::new(
                    sentinel::UNRECOGNIZED_DOCUMENT,
                    id,
                    CommandStatus::UnableToProcessDocument,
                    catalog::get_message(
                        codes::UNABLE_TO_PROCESS,
                        &[document.to_document_string()],
                    ),
                );
            }
            Classification::UndefinedCommand { id } => {
                warn!(id = %id, "request without command");
                return CommandResponse::new(
                    sentinel::UNDEFINED_COMMAND,
                    id,
                    CommandStatus::UndefinedCommand,
                    catalog::get_message(
                        codes::COMMAND_NOT_DEFINED,
                        &[document.to_document_string()],
                    ),
                );
            }
            Classification::UndefinedProgram { command, id } => {
                warn!(command = %command, id = %id, "request without client program");
                return CommandResponse::new(
                    sentinel::UNDEFINED_PROGRAM,
                    id,
                    CommandStatus::UndefinedProgram,
                    catalog::get_message(
                        codes::PROGRAM_NOT_SET,
                        &[document.to_document_string()],
                    ),
                );
            }
        };

        let program: ClientProgram = match request.client_program().parse() {
            Ok(program) => program,
            Err(_) => {
                warn!(
                    program = %request.client_program(),
                    command = %request.command(),
                    id = %request.id(),
                    "unknown client program"
                );
                return CommandResponse::new(
                    request.command(),
                    request.id(),
                    CommandStatus::UndefinedProgram,
                    catalog::get_message(codes::UNKNOWN_PROGRAM, &[request.client_program()]),
                );
            }
        };

        debug!(program = %program, command = %request.command(), id = %request.id(), "dispatching");
        match catch_panic(|| state.dispatch(program, &request)) {
            Ok(Ok(dispatched)) => {
                if dispatched.close_requested {
                    self.session.mark_close_requested();
                }
                dispatched.response
            }
            Ok(Err(fault)) => self.fault_response(&request, &fault),
            Err(panic) => self.fault_response(&request, &HandlerPanic(panic)),
        }
    }

    fn fault_response(
        &self,
        request: &CommandRequest,
        fault: &(dyn std::error::Error + 'static),
    ) -> CommandResponse {
        let chain = crate::errors::error_chain(fault);
        error!(
            command = %request.command(),
            id = %request.id(),
            error = %chain,
            "command failed with an unexpected fault"
        );
        if let Some(log) = self.session.session_log() {
            log.note_error(&format!("Fault executing {}", request.document()), fault);
        }

        CommandResponse::new(
            sentinel::UNCAUGHT_EXCEPTION,
            request.id(),
            CommandStatus::CommandFailed,
            catalog::get_message(codes::UNCAUGHT_EXCEPTION, &[request.document()]),
        )
        .with_details(chain)
    }
}

fn parse_failure(raw: &str, err: &DocumentError) -> CommandResponse {
    warn!(error = %err, "unable to parse request document");
    CommandResponse::new(
        sentinel::UNRECOGNIZED_DOCUMENT,
        DEFAULT_ID,
        CommandStatus::UnableToProcessDocument,
        catalog::get_message(codes::UNABLE_TO_PARSE, &[raw]),
    )
    .with_details(err.to_string())
}

#[derive(Error, Debug)]
#[error("handler panicked: {0}")]
struct HandlerPanic(String);
