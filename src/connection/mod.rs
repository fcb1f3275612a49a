pub mod config;

use crate::core::{DbError, ErrorDetail, Record, Result};
use crate::engine::{EngineEvent, EventSink, SqlEngine};
use crate::json::RowDecoder;
use log::{debug, info, warn};
use std::sync::Mutex;
use tokio::sync::Mutex as AsyncMutex;

/// Callback receiving decoded rows, one call per row, in engine order.
pub type RowHandler<'h> = Box<dyn FnMut(Record) + Send + 'h>;

/// Lifecycle of a single statement.
///
/// `Streaming` is entered on the first data row; `Completed` on the
/// end-of-stream marker. Whether an error was reported is tracked next to
/// the state, not as a state of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    Idle,
    Dispatched,
    Streaming,
    Completed,
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    id: u64,
    reads_rows: bool,
}

#[derive(Debug, Default)]
struct SlotState {
    current: Option<InFlight>,
    next_id: u64,
}

/// The "current operation" slot. At most one statement holds it.
#[derive(Debug, Default)]
pub struct OperationSlot {
    state: Mutex<SlotState>,
}

impl OperationSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot or fail with `ProtocolError` if a statement is in flight.
    pub fn try_acquire(&self, reads_rows: bool) -> Result<SlotGuard<'_>> {
        let mut state = self.state.lock()?;

        if let Some(active) = state.current {
            return Err(DbError::ProtocolError(format!(
                "statement #{} is still in flight{}",
                active.id,
                if active.reads_rows { " (pending read)" } else { "" }
            )));
        }

        state.next_id += 1;
        let id = state.next_id;
        state.current = Some(InFlight { id, reads_rows });

        Ok(SlotGuard { slot: self, id })
    }

    pub fn is_idle(&self) -> bool {
        self.state
            .lock()
            .map(|state| state.current.is_none())
            .unwrap_or(false)
    }
}

/// Releases the slot on drop, whatever way the statement ended.
#[derive(Debug)]
pub struct SlotGuard<'a> {
    slot: &'a OperationSlot,
    id: u64,
}

impl SlotGuard<'_> {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        let mut state = match self.slot.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.current = None;
    }
}

/// State of the statement currently holding the slot.
pub(crate) struct PendingOperation<'a, 'h> {
    guard: SlotGuard<'a>,
    handler: Option<RowHandler<'h>>,
    decoder: &'a RowDecoder,
    state: ExecState,
    error: Option<ErrorDetail>,
    decode_error: Option<DbError>,
    rows_delivered: usize,
}

impl<'a, 'h> PendingOperation<'a, 'h> {
    pub(crate) fn new(
        guard: SlotGuard<'a>,
        handler: Option<RowHandler<'h>>,
        decoder: &'a RowDecoder,
    ) -> Self {
        Self {
            guard,
            handler,
            decoder,
            state: ExecState::Idle,
            error: None,
            decode_error: None,
            rows_delivered: 0,
        }
    }

    pub(crate) fn state(&self) -> ExecState {
        self.state
    }

    pub(crate) fn dispatched(&mut self) {
        self.error = None;
        self.state = ExecState::Dispatched;
    }

    pub(crate) fn on_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Row { sequence: None, .. } => {
                self.state = ExecState::Completed;
            }
            EngineEvent::Row {
                sequence: Some(sequence),
                row,
            } => self.on_row(sequence, row),
            EngineEvent::Error(detail) => {
                if let Some(previous) = &self.error {
                    warn!(
                        "Statement #{} reported a second error '{}' (previous: '{}')",
                        self.guard.id(),
                        detail.message,
                        previous.message
                    );
                }
                self.error = Some(detail);
            }
            EngineEvent::Unhandled(payload) => {
                warn!("Unhandled engine message for statement #{}: {}", self.guard.id(), payload);
                self.error = Some(ErrorDetail::new("unhandled engine message", payload));
            }
        }
    }

    fn on_row(&mut self, sequence: u64, row: Option<serde_json::Map<String, serde_json::Value>>) {
        if self.state == ExecState::Completed {
            warn!(
                "Dropping row {} received after end of stream for statement #{}",
                sequence,
                self.guard.id()
            );
            return;
        }

        let Some(row) = row else {
            warn!("Row event {} without payload for statement #{}", sequence, self.guard.id());
            return;
        };

        self.state = ExecState::Streaming;

        if self.decode_error.is_some() {
            return;
        }

        let Some(handler) = self.handler.as_mut() else {
            debug!("Ignoring row {} of non-reading statement #{}", sequence, self.guard.id());
            return;
        };

        match self.decoder.decode(row) {
            Ok(record) => {
                handler(record);
                self.rows_delivered += 1;
            }
            Err(err) => self.decode_error = Some(err),
        }
    }

    /// Release the slot, then turn whatever was reported into the call result.
    pub(crate) fn finish(self, dispatch: std::result::Result<(), ErrorDetail>) -> Result<usize> {
        let PendingOperation {
            guard,
            handler,
            error,
            decode_error,
            rows_delivered,
            ..
        } = self;
        let id = guard.id();
        drop(handler);
        drop(guard);

        if let Err(detail) = dispatch {
            return Err(DbError::EngineError(detail));
        }
        if let Some(detail) = error {
            debug!("Statement #{} failed: {}", id, detail);
            return Err(DbError::EngineError(detail));
        }
        if let Some(err) = decode_error {
            return Err(err);
        }

        debug!("Statement #{} completed, {} row(s) delivered", id, rows_delivered);
        Ok(rows_delivered)
    }
}

struct EngineHandle {
    engine: Box<dyn SqlEngine>,
    opened: bool,
    closed: bool,
}

/// Exclusive owner of one engine connection plus the single-flight slot.
///
/// The engine is opened lazily by the first statement and released by
/// [`Connection::close`].
pub struct Connection {
    engine: AsyncMutex<EngineHandle>,
    slot: OperationSlot,
    decoder: RowDecoder,
    db_file_name: String,
}

impl Connection {
    pub fn new(engine: Box<dyn SqlEngine>, db_file_name: &str, decoder: RowDecoder) -> Self {
        Self {
            engine: AsyncMutex::new(EngineHandle {
                engine,
                opened: false,
                closed: false,
            }),
            slot: OperationSlot::new(),
            decoder,
            db_file_name: db_file_name.to_string(),
        }
    }

    /// Whether no statement is in flight.
    pub fn is_idle(&self) -> bool {
        self.slot.is_idle()
    }

    /// Run one statement, forwarding decoded rows to `handler`.
    ///
    /// Returns the number of rows handed to the handler. Fails with
    /// `ValidationError` for empty SQL and `ProtocolError` while another
    /// statement is in flight, both without touching the engine.
    pub async fn execute(&self, sql: &str, handler: Option<RowHandler<'_>>) -> Result<usize> {
        if sql.trim().is_empty() {
            return Err(DbError::ValidationError("SQL statement cannot be empty".to_string()));
        }

        let guard = self.slot.try_acquire(handler.is_some())?;
        let mut op = PendingOperation::new(guard, handler, &self.decoder);

        let mut handle = self.engine.lock().await;
        if handle.closed {
            return Err(DbError::ProtocolError("adapter is closed".to_string()));
        }
        if !handle.opened {
            handle
                .engine
                .open(&self.db_file_name)
                .await
                .map_err(DbError::EngineError)?;
            handle.opened = true;
            info!("Opened engine database '{}'", self.db_file_name);
        }

        let (sink, mut events) = EventSink::channel();
        op.dispatched();
        debug!("Dispatching statement #{}: {}", op.guard.id(), sql);

        let outcome = {
            let mut dispatch = handle.engine.exec(sql, sink);
            loop {
                tokio::select! {
                    biased;
                    Some(event) = events.recv() => op.on_event(event),
                    outcome = &mut dispatch => break outcome,
                }
            }
        };

        // deliver anything queued before exec returned, then stop listening
        events.close();
        while let Ok(event) = events.try_recv() {
            op.on_event(event);
        }

        if op.state() != ExecState::Completed && outcome.is_ok() {
            debug!("Statement #{} finished without end-of-stream marker", op.guard.id());
        }

        drop(handle);
        op.finish(outcome)
    }

    /// Release the engine. Safe to call more than once; later statements
    /// fail with `ProtocolError`.
    pub async fn close(&self) -> Result<()> {
        let mut handle = self.engine.lock().await;

        if handle.closed {
            warn!("Connection to '{}' already closed", self.db_file_name);
            return Ok(());
        }
        handle.closed = true;

        if handle.opened {
            handle.opened = false;
            handle.engine.close().await.map_err(DbError::EngineError)?;
            info!("Closed engine database '{}'", self.db_file_name);
        }

        Ok(())
    }

    pub async fn is_closed(&self) -> bool {
        self.engine.lock().await.closed
    }
}
