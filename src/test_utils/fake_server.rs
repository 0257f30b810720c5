//! In-process stand-in for a MySQL server and its client library.
//!
//! A [`FakeServer`] owns the tables and every open session. Connections made
//! through its [`FakeConnector`] talk to it through the same [`MysqlClient`]
//! calls a real client library would answer, so both execution paths, the
//! reconnect logic, and result cleanup can be observed from tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::fake_sql::{Catalog, Outcome, SessionFlags, count_markers, substitute};
use crate::client::{
    BufferType, FetchBuffer, FetchStatus, Field, MysqlClient, MysqlConnector, ParamBuffer,
    ResultId, StmtId, TextRow,
};
use crate::config::{ConnectParams, ConnectionOptions};
use crate::error::{ServerError, codes};
use crate::rewrite::escape::escape_string;

pub const CR_CONN_HOST_ERROR: u32 = 2003;
pub const CR_COMMANDS_OUT_OF_SYNC: u32 = 2014;
pub const ER_UNKNOWN_STMT_HANDLER: u32 = 1243;

/// Server version reported unless overridden (8.0.36).
pub const DEFAULT_SERVER_VERSION: u32 = 80036;

#[derive(Debug, Default)]
struct FakeResult {
    fields: Vec<Field>,
    rows: Vec<TextRow>,
    pos: usize,
}

impl FakeResult {
    fn new(mut fields: Vec<Field>, rows: Vec<TextRow>, compute_max_length: bool) -> Self {
        if compute_max_length {
            for (idx, field) in fields.iter_mut().enumerate() {
                field.max_length = rows
                    .iter()
                    .filter_map(|row| row.get(idx).and_then(Option::as_ref))
                    .map(|cell| cell.len() as u64)
                    .max()
                    .unwrap_or(0);
            }
        }
        Self { fields, rows, pos: 0 }
    }
}

#[derive(Debug, Default)]
struct FakeStmt {
    sql: Vec<u8>,
    param_count: usize,
    params: Option<Vec<ParamBuffer>>,
    metadata: Option<Vec<Field>>,
    result: Option<FakeResult>,
    stored: bool,
    result_types: Option<Vec<BufferType>>,
    current: Option<usize>,
    affected: u64,
    insert_id: u64,
}

#[derive(Debug, Default)]
struct Session {
    alive: bool,
    autocommit: bool,
    flags: SessionFlags,
    pending: Option<Outcome>,
    results: HashMap<u64, FakeResult>,
    stmts: HashMap<u64, FakeStmt>,
    next_handle: u64,
    affected: u64,
    insert_id: u64,
    info: Option<String>,
    questions: u64,
}

impl Session {
    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

#[derive(Debug)]
struct ServerState {
    server_version: u32,
    catalog: Catalog,
    sessions: HashMap<u64, Session>,
    next_thread_id: u64,
    refuse_connects: usize,
    reject_prepare: Vec<String>,
    close_failures: usize,
    log: Vec<String>,
    connects: usize,
    prepare_calls: usize,
    bind_param_calls: usize,
    commits: usize,
    rollbacks: usize,
}

impl ServerState {
    fn session(&mut self, thread_id: u64) -> Result<&mut Session, ServerError> {
        match self.sessions.get_mut(&thread_id) {
            Some(session) if session.alive => Ok(session),
            _ => Err(ServerError::gone_away()),
        }
    }

    fn rejects_prepare(&self, sql: &[u8]) -> bool {
        let head = String::from_utf8_lossy(sql);
        let head = head.trim_start();
        self.reject_prepare.iter().any(|keyword| {
            head.get(..keyword.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(keyword))
        })
    }
}

/// Shared handle to one fake server. Clones refer to the same server.
#[derive(Debug, Clone)]
pub struct FakeServer {
    state: Arc<Mutex<ServerState>>,
}

impl Default for FakeServer {
    fn default() -> Self {
        Self::with_version(DEFAULT_SERVER_VERSION)
    }
}

impl FakeServer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Server reporting `version` (e.g. `40102` for a server without
    /// binary-protocol prepared statements).
    #[must_use]
    pub fn with_version(version: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(ServerState {
                server_version: version,
                catalog: Catalog::default(),
                sessions: HashMap::new(),
                next_thread_id: 0,
                refuse_connects: 0,
                reject_prepare: Vec::new(),
                close_failures: 0,
                log: Vec::new(),
                connects: 0,
                prepare_calls: 0,
                bind_param_calls: 0,
                commits: 0,
                rollbacks: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn connector(&self) -> FakeConnector {
        FakeConnector {
            server: self.clone(),
        }
    }

    /// Run `;`-separated statements directly against the catalog.
    ///
    /// # Errors
    /// Returns the first statement's error.
    pub fn execute_script(&self, script: &str) -> Result<(), ServerError> {
        let mut state = self.lock();
        for statement in script.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            state
                .catalog
                .run(statement.as_bytes(), SessionFlags::default())?;
        }
        Ok(())
    }

    /// Drop every open session, as a server restart or idle timeout would.
    /// Existing clients see "server has gone away" on their next call.
    pub fn kill_sessions(&self) {
        let mut state = self.lock();
        for session in state.sessions.values_mut() {
            session.alive = false;
            session.results.clear();
            session.stmts.clear();
            session.pending = None;
        }
    }

    /// Refuse the next `count` connection attempts.
    pub fn refuse_connections(&self, count: usize) {
        self.lock().refuse_connects = count;
    }

    /// Answer `ER_UNSUPPORTED_PS` when preparing statements starting with
    /// `keyword`.
    pub fn reject_prepare(&self, keyword: &str) {
        self.lock().reject_prepare.push(keyword.to_string());
    }

    /// Fail the next `count` prepared-statement closes with an unknown-handler
    /// error. The statement stays open on the server.
    pub fn fail_statement_closes(&self, count: usize) {
        self.lock().close_failures = count;
    }

    /// Result sets (text or binary) not yet freed on live sessions.
    #[must_use]
    pub fn live_results(&self) -> usize {
        self.lock()
            .sessions
            .values()
            .filter(|s| s.alive)
            .map(|s| s.results.len() + s.stmts.values().filter(|st| st.result.is_some()).count())
            .sum()
    }

    /// Server-side prepared statements not yet closed on live sessions.
    #[must_use]
    pub fn open_statements(&self) -> usize {
        self.lock()
            .sessions
            .values()
            .filter(|s| s.alive)
            .map(|s| s.stmts.len())
            .sum()
    }

    #[must_use]
    pub fn live_sessions(&self) -> usize {
        self.lock().sessions.values().filter(|s| s.alive).count()
    }

    /// Every statement text the server received, in order. Native executions
    /// are logged with their parameters applied.
    #[must_use]
    pub fn statement_log(&self) -> Vec<String> {
        self.lock().log.clone()
    }

    pub fn clear_log(&self) {
        self.lock().log.clear();
    }

    #[must_use]
    pub fn connects(&self) -> usize {
        self.lock().connects
    }

    #[must_use]
    pub fn prepare_calls(&self) -> usize {
        self.lock().prepare_calls
    }

    #[must_use]
    pub fn bind_param_calls(&self) -> usize {
        self.lock().bind_param_calls
    }

    /// `(commits, rollbacks)` received.
    #[must_use]
    pub fn transactions(&self) -> (usize, usize) {
        let state = self.lock();
        (state.commits, state.rollbacks)
    }
}

/// Opens [`FakeClient`] sessions on a [`FakeServer`].
#[derive(Debug, Clone)]
pub struct FakeConnector {
    server: FakeServer,
}

#[async_trait]
impl MysqlConnector for FakeConnector {
    type Client = FakeClient;

    async fn connect(
        &self,
        params: &ConnectParams,
        options: &ConnectionOptions,
    ) -> Result<FakeClient, ServerError> {
        let mut state = self.server.lock();
        if state.refuse_connects > 0 {
            state.refuse_connects -= 1;
            let host = params.host.as_deref().unwrap_or("localhost");
            return Err(ServerError::new(
                CR_CONN_HOST_ERROR,
                format!("Can't connect to MySQL server on '{host}'"),
            ));
        }
        state.connects += 1;
        state.next_thread_id += 1;
        let thread_id = state.next_thread_id;
        state.sessions.insert(
            thread_id,
            Session {
                alive: true,
                autocommit: true,
                flags: SessionFlags {
                    found_rows: options.client_found_rows,
                },
                ..Session::default()
            },
        );
        Ok(FakeClient {
            server: self.server.clone(),
            thread_id,
            host: params.host.clone().unwrap_or_else(|| "localhost".to_string()),
        })
    }
}

/// One session on a [`FakeServer`].
#[derive(Debug)]
pub struct FakeClient {
    server: FakeServer,
    thread_id: u64,
    host: String,
}

impl FakeClient {
    fn with_session<T>(
        &self,
        f: impl FnOnce(&mut Session) -> Result<T, ServerError>,
    ) -> Result<T, ServerError> {
        let mut state = self.server.lock();
        f(state.session(self.thread_id)?)
    }

    /// Infallible reads answer with `default` on a dead session, like a
    /// client library returning zero after the connection dropped.
    fn read<T>(&self, default: T, f: impl FnOnce(&Session) -> T) -> T {
        let state = self.server.lock();
        match state.sessions.get(&self.thread_id) {
            Some(session) if session.alive => f(session),
            _ => default,
        }
    }

    fn run(&self, sql: &[u8]) -> Result<Outcome, ServerError> {
        let mut state = self.server.lock();
        let flags = state.session(self.thread_id)?.flags;
        state.log.push(String::from_utf8_lossy(sql).into_owned());
        let outcome = state.catalog.run(sql, flags);
        if let Ok(session) = state.session(self.thread_id) {
            session.questions += 1;
        }
        outcome
    }
}

fn unknown_stmt(stmt: StmtId) -> ServerError {
    ServerError::new(
        ER_UNKNOWN_STMT_HANDLER,
        format!("Unknown prepared statement handler ({}) given to mysql_stmt", stmt.0),
    )
}

/// Literal text the server substitutes for a bound parameter.
fn param_literal(buffer: &ParamBuffer) -> Vec<u8> {
    if buffer.is_null {
        return b"NULL".to_vec();
    }
    let fixed = |data: &[u8]| {
        let mut out = [0u8; 8];
        let take = data.len().min(8);
        out[..take].copy_from_slice(&data[..take]);
        out
    };
    match buffer.buffer_type {
        BufferType::Null => b"NULL".to_vec(),
        BufferType::Long | BufferType::LongLong => {
            i64::from_le_bytes(fixed(&buffer.data)).to_string().into_bytes()
        }
        BufferType::Double => f64::from_le_bytes(fixed(&buffer.data))
            .to_string()
            .into_bytes(),
        BufferType::String | BufferType::Blob => {
            let mut out = Vec::with_capacity(buffer.data.len() + 2);
            out.push(b'\'');
            out.extend_from_slice(&escape_string(&buffer.data));
            out.push(b'\'');
            out
        }
    }
}

/// Store one cell into a bound receive buffer.
fn fill_buffer(buffer: &mut FetchBuffer, cell: Option<&[u8]>) {
    let Some(bytes) = cell else {
        buffer.fill_null();
        return;
    };
    let text = std::str::from_utf8(bytes).ok().map(str::trim);
    match buffer.buffer_type {
        BufferType::Long | BufferType::LongLong => {
            // Unsigned cells above i64::MAX keep their u64 bit pattern.
            let bytes = text
                .and_then(|t| {
                    t.parse::<i64>()
                        .map(i64::to_le_bytes)
                        .or_else(|_| t.parse::<u64>().map(u64::to_le_bytes))
                        .ok()
                        .or_else(|| t.parse::<f64>().ok().map(|f| (f as i64).to_le_bytes()))
                })
                .unwrap_or_default();
            buffer.fill(&bytes);
        }
        BufferType::Double => {
            let v = text.and_then(|t| t.parse::<f64>().ok()).unwrap_or(0.0);
            buffer.fill(&v.to_le_bytes());
        }
        BufferType::Null => buffer.fill_null(),
        BufferType::String | BufferType::Blob => buffer.fill(bytes),
    }
}

#[async_trait]
impl MysqlClient for FakeClient {
    async fn query(&mut self, sql: &[u8]) -> Result<(), ServerError> {
        let outcome = self.run(sql)?;
        self.with_session(|session| {
            session.info = None;
            match outcome {
                Outcome::Rows { .. } => {
                    session.affected = 0;
                    session.pending = Some(outcome);
                }
                Outcome::Affected {
                    rows,
                    insert_id,
                    info,
                } => {
                    session.affected = rows;
                    if insert_id != 0 {
                        session.insert_id = insert_id;
                    }
                    session.info = info;
                    session.pending = None;
                }
            }
            Ok(())
        })
    }

    async fn store_result(&mut self) -> Result<Option<ResultId>, ServerError> {
        self.with_session(|session| {
            let Some(Outcome::Rows { fields, rows }) = session.pending.take() else {
                return Ok(None);
            };
            session.affected = rows.len() as u64;
            let id = session.handle();
            session.results.insert(id, FakeResult::new(fields, rows, true));
            Ok(Some(ResultId(id)))
        })
    }

    async fn use_result(&mut self) -> Result<Option<ResultId>, ServerError> {
        self.with_session(|session| {
            let Some(Outcome::Rows { fields, rows }) = session.pending.take() else {
                return Ok(None);
            };
            let id = session.handle();
            session.results.insert(id, FakeResult::new(fields, rows, false));
            Ok(Some(ResultId(id)))
        })
    }

    async fn fetch_row(&mut self, result: ResultId) -> Result<Option<TextRow>, ServerError> {
        self.with_session(|session| {
            let Some(res) = session.results.get_mut(&result.0) else {
                return Err(ServerError::new(CR_COMMANDS_OUT_OF_SYNC, "Commands out of sync"));
            };
            let row = res.rows.get(res.pos).cloned();
            if row.is_some() {
                res.pos += 1;
            }
            Ok(row)
        })
    }

    fn num_rows(&self, result: ResultId) -> u64 {
        self.read(0, |session| {
            session
                .results
                .get(&result.0)
                .map_or(0, |res| res.rows.len() as u64)
        })
    }

    fn fetch_fields(&self, result: ResultId) -> Vec<Field> {
        self.read(Vec::new(), |session| {
            session
                .results
                .get(&result.0)
                .map(|res| res.fields.clone())
                .unwrap_or_default()
        })
    }

    fn free_result(&mut self, result: ResultId) {
        let mut state = self.server.lock();
        if let Some(session) = state.sessions.get_mut(&self.thread_id) {
            session.results.remove(&result.0);
        }
    }

    async fn list_fields(&mut self, table: &str) -> Result<ResultId, ServerError> {
        let mut state = self.server.lock();
        state.session(self.thread_id)?;
        state.log.push(format!("LISTFIELDS {table}"));
        let fields = state.catalog.table(table)?.fields(table);
        let session = state.session(self.thread_id)?;
        let id = session.handle();
        session.results.insert(id, FakeResult::new(fields, Vec::new(), false));
        Ok(ResultId(id))
    }

    fn affected_rows(&self) -> u64 {
        self.read(0, |session| session.affected)
    }

    fn insert_id(&self) -> u64 {
        self.read(0, |session| session.insert_id)
    }

    fn info(&self) -> Option<String> {
        self.read(None, |session| session.info.clone())
    }

    async fn stmt_prepare(&mut self, sql: &str) -> Result<StmtId, ServerError> {
        let mut state = self.server.lock();
        state.session(self.thread_id)?;
        state.prepare_calls += 1;
        if state.rejects_prepare(sql.as_bytes()) {
            return Err(ServerError::new(
                codes::ER_UNSUPPORTED_PS,
                "This command is not supported in the prepared statement protocol yet",
            ));
        }
        let session = state.session(self.thread_id)?;
        let id = session.handle();
        session.stmts.insert(
            id,
            FakeStmt {
                sql: sql.as_bytes().to_vec(),
                param_count: count_markers(sql.as_bytes()),
                ..FakeStmt::default()
            },
        );
        Ok(StmtId(id))
    }

    fn stmt_param_count(&self, stmt: StmtId) -> usize {
        self.read(0, |session| {
            session.stmts.get(&stmt.0).map_or(0, |st| st.param_count)
        })
    }

    fn stmt_bind_param(&mut self, stmt: StmtId, params: &[ParamBuffer]) -> Result<(), ServerError> {
        let mut state = self.server.lock();
        state.bind_param_calls += 1;
        let session = state.session(self.thread_id)?;
        let st = session.stmts.get_mut(&stmt.0).ok_or_else(|| unknown_stmt(stmt))?;
        st.params = Some(params.to_vec());
        Ok(())
    }

    async fn stmt_execute(&mut self, stmt: StmtId) -> Result<(), ServerError> {
        let sql = self.with_session(|session| {
            let st = session.stmts.get_mut(&stmt.0).ok_or_else(|| unknown_stmt(stmt))?;
            if st.param_count > 0 && st.params.is_none() {
                return Err(ServerError::new(2031, "No data supplied for parameters in prepared statement"));
            }
            let literals: Vec<Vec<u8>> = st
                .params
                .iter()
                .flatten()
                .map(param_literal)
                .collect();
            Ok(substitute(&st.sql, &literals))
        })?;
        let outcome = self.run(&sql)?;
        self.with_session(|session| {
            let st = session.stmts.get_mut(&stmt.0).ok_or_else(|| unknown_stmt(stmt))?;
            st.result = None;
            st.stored = false;
            st.current = None;
            match outcome {
                Outcome::Rows { fields, rows } => {
                    st.affected = rows.len() as u64;
                    st.metadata = Some(fields.clone());
                    st.result = Some(FakeResult::new(fields, rows, false));
                }
                Outcome::Affected {
                    rows, insert_id, ..
                } => {
                    st.affected = rows;
                    st.insert_id = insert_id;
                    st.metadata = None;
                    if insert_id != 0 {
                        session.insert_id = insert_id;
                    }
                }
            }
            Ok(())
        })
    }

    fn stmt_result_metadata(&self, stmt: StmtId) -> Option<Vec<Field>> {
        self.read(None, |session| {
            session.stmts.get(&stmt.0).and_then(|st| st.metadata.clone())
        })
    }

    async fn stmt_store_result(&mut self, stmt: StmtId) -> Result<(), ServerError> {
        self.with_session(|session| {
            let st = session.stmts.get_mut(&stmt.0).ok_or_else(|| unknown_stmt(stmt))?;
            st.stored = true;
            Ok(())
        })
    }

    fn stmt_num_rows(&self, stmt: StmtId) -> u64 {
        self.read(0, |session| {
            session
                .stmts
                .get(&stmt.0)
                .filter(|st| st.stored)
                .and_then(|st| st.result.as_ref())
                .map_or(0, |res| res.rows.len() as u64)
        })
    }

    fn stmt_affected_rows(&self, stmt: StmtId) -> u64 {
        self.read(0, |session| session.stmts.get(&stmt.0).map_or(0, |st| st.affected))
    }

    fn stmt_insert_id(&self, stmt: StmtId) -> u64 {
        self.read(0, |session| session.stmts.get(&stmt.0).map_or(0, |st| st.insert_id))
    }

    fn stmt_bind_result(&mut self, stmt: StmtId, types: &[BufferType]) -> Result<(), ServerError> {
        self.with_session(|session| {
            let st = session.stmts.get_mut(&stmt.0).ok_or_else(|| unknown_stmt(stmt))?;
            st.result_types = Some(types.to_vec());
            Ok(())
        })
    }

    async fn stmt_fetch(
        &mut self,
        stmt: StmtId,
        buffers: &mut [FetchBuffer],
    ) -> Result<FetchStatus, ServerError> {
        self.with_session(|session| {
            let st = session.stmts.get_mut(&stmt.0).ok_or_else(|| unknown_stmt(stmt))?;
            if st.result_types.is_none() {
                return Err(ServerError::new(2032, "Result buffers were not bound"));
            }
            let Some(result) = st.result.as_mut() else {
                return Err(ServerError::new(CR_COMMANDS_OUT_OF_SYNC, "Commands out of sync"));
            };
            let Some(row) = result.rows.get(result.pos) else {
                st.current = None;
                return Ok(FetchStatus::NoData);
            };
            for (buffer, cell) in buffers.iter_mut().zip(row) {
                fill_buffer(buffer, cell.as_deref());
            }
            st.current = Some(result.pos);
            result.pos += 1;
            Ok(FetchStatus::Row)
        })
    }

    async fn stmt_fetch_column(
        &mut self,
        stmt: StmtId,
        column: usize,
        offset: u64,
        buffer: &mut FetchBuffer,
    ) -> Result<(), ServerError> {
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        self.with_session(|session| {
            let st = session.stmts.get(&stmt.0).ok_or_else(|| unknown_stmt(stmt))?;
            let cell = st
                .current
                .and_then(|row| st.result.as_ref()?.rows.get(row)?.get(column).cloned())
                .ok_or_else(|| ServerError::new(2051, "Attempt to read column without prior row fetch"))?;
            match cell {
                Some(bytes) => buffer.fill(bytes.get(offset..).unwrap_or_default()),
                None => buffer.fill_null(),
            }
            Ok(())
        })
    }

    async fn stmt_free_result(&mut self, stmt: StmtId) -> Result<(), ServerError> {
        self.with_session(|session| {
            let st = session.stmts.get_mut(&stmt.0).ok_or_else(|| unknown_stmt(stmt))?;
            st.result = None;
            st.stored = false;
            st.current = None;
            Ok(())
        })
    }

    async fn stmt_close(&mut self, stmt: StmtId) -> Result<(), ServerError> {
        {
            let mut state = self.server.lock();
            state.session(self.thread_id)?;
            if state.close_failures > 0 {
                state.close_failures -= 1;
                return Err(unknown_stmt(stmt));
            }
        }
        self.with_session(|session| {
            session
                .stmts
                .remove(&stmt.0)
                .map(|_| ())
                .ok_or_else(|| unknown_stmt(stmt))
        })
    }

    async fn commit(&mut self) -> Result<(), ServerError> {
        let mut state = self.server.lock();
        state.session(self.thread_id)?;
        state.commits += 1;
        state.log.push("COMMIT".to_string());
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), ServerError> {
        let mut state = self.server.lock();
        state.session(self.thread_id)?;
        state.rollbacks += 1;
        state.log.push("ROLLBACK".to_string());
        Ok(())
    }

    async fn set_autocommit(&mut self, on: bool) -> Result<(), ServerError> {
        let mut state = self.server.lock();
        state.session(self.thread_id)?.autocommit = on;
        state.log.push(format!("SET autocommit={}", u8::from(on)));
        Ok(())
    }

    fn server_version(&self) -> u32 {
        self.server.lock().server_version
    }

    fn server_info(&self) -> String {
        let v = self.server_version();
        format!("{}.{}.{}-fake", v / 10000, v / 100 % 100, v % 100)
    }

    fn host_info(&self) -> String {
        format!("{} via fake transport", self.host)
    }

    fn proto_info(&self) -> u32 {
        10
    }

    fn thread_id(&self) -> u64 {
        self.thread_id
    }

    async fn stat(&mut self) -> Result<String, ServerError> {
        let mut state = self.server.lock();
        let threads = state.sessions.values().filter(|s| s.alive).count();
        let questions = state.session(self.thread_id)?.questions;
        Ok(format!("Uptime: 1  Threads: {threads}  Questions: {questions}"))
    }

    async fn close(&mut self) {
        self.server.lock().sessions.remove(&self.thread_id);
    }
}
