//! Canonical binary encoding for operations, logs, and journals.
//!
//! Format (all integers little-endian, strings length-prefixed UTF-8):
//! - op: kind u8, model u32, reference, prev, relation count u32 +
//!   relations, name, author_id, timestamp i64, size i64, note
//! - log: op count u32 + ops, child count u32 + children, signature
//!   flag u8 + optional u32-prefixed bytes
//! - journal: magic "LJV1", author id, log count u32 + logs
//!
//! Children are written in ascending order of their derived id, so the
//! same forest always produces the same bytes regardless of insertion
//! order. Signed bytes are the log encoding with every signature field
//! omitted.

use crate::error::{Error, Result};
use crate::journal::Journal;
use crate::log::Log;
use crate::op::{Model, Op, OpType};

const MAGIC: &[u8; 4] = b"LJV1";

// Encoding writes into a plain Vec and cannot fail.

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_i64(buf: &mut Vec<u8>, v: i64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_str(buf: &mut Vec<u8>, s: &str) {
    put_u32(buf, s.len() as u32);
    buf.extend_from_slice(s.as_bytes());
}

fn put_op(buf: &mut Vec<u8>, op: &Op) {
    buf.push(op.kind as u8);
    put_u32(buf, op.model as u32);
    put_str(buf, &op.reference);
    put_str(buf, &op.prev);
    put_u32(buf, op.relations.len() as u32);
    for rel in &op.relations {
        put_str(buf, rel);
    }
    put_str(buf, &op.name);
    put_str(buf, &op.author_id);
    put_i64(buf, op.timestamp);
    put_i64(buf, op.size);
    put_str(buf, &op.note);
}

fn put_log(buf: &mut Vec<u8>, log: &Log, include_signatures: bool) {
    put_u32(buf, log.ops.len() as u32);
    for op in &log.ops {
        put_op(buf, op);
    }

    let mut children: Vec<&Log> = log.logs.iter().collect();
    children.sort_by_key(|l| l.id());
    put_u32(buf, children.len() as u32);
    for child in children {
        put_log(buf, child, include_signatures);
    }

    if include_signatures {
        match &log.signature {
            Some(sig) => {
                buf.push(1);
                put_u32(buf, sig.len() as u32);
                buf.extend_from_slice(sig);
            }
            None => buf.push(0),
        }
    }
}

/// Canonical bytes of a single operation. Log identifiers are derived
/// from the bytes of the log's init op.
pub fn op_bytes(op: &Op) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);
    put_op(&mut buf, op);
    buf
}

/// Canonical bytes of a log including descendants and signatures.
pub fn log_bytes(log: &Log) -> Vec<u8> {
    let mut buf = Vec::new();
    put_log(&mut buf, log, true);
    buf
}

/// The bytes a log signature covers: the log and all descendants, with
/// every signature field omitted.
pub fn log_signed_bytes(log: &Log) -> Vec<u8> {
    let mut buf = Vec::new();
    put_log(&mut buf, log, false);
    buf
}

/// Canonical bytes of an entire journal.
pub fn journal_bytes(journal: &Journal) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(MAGIC);
    put_str(&mut buf, journal.author_id());

    let mut logs: Vec<&Log> = journal.logs().iter().collect();
    logs.sort_by_key(|l| l.id());
    put_u32(&mut buf, logs.len() as u32);
    for log in logs {
        put_log(&mut buf, log, true);
    }
    buf
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.buf.len() - self.pos < n {
            return Err(Error::Wire("unexpected end of input".into()));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        let bytes: [u8; 4] = self.take(4)?.try_into().expect("slice length checked");
        Ok(u32::from_le_bytes(bytes))
    }

    fn i64(&mut self) -> Result<i64> {
        let bytes: [u8; 8] = self.take(8)?.try_into().expect("slice length checked");
        Ok(i64::from_le_bytes(bytes))
    }

    fn string(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| Error::Wire("invalid utf-8".into()))
    }

    fn op(&mut self) -> Result<Op> {
        let kind = self.u8()?;
        let kind =
            OpType::from_wire(kind).ok_or_else(|| Error::Wire(format!("unknown op type {kind}")))?;
        let model = self.u32()?;
        let model =
            Model::from_wire(model).ok_or_else(|| Error::Wire(format!("unknown model {model}")))?;

        let reference = self.string()?;
        let prev = self.string()?;
        let rel_count = self.u32()? as usize;
        let mut relations = Vec::with_capacity(rel_count.min(64));
        for _ in 0..rel_count {
            relations.push(self.string()?);
        }
        let name = self.string()?;
        let author_id = self.string()?;
        let timestamp = self.i64()?;
        let size = self.i64()?;
        let note = self.string()?;

        Ok(Op {
            kind,
            model,
            reference,
            prev,
            relations,
            name,
            author_id,
            timestamp,
            size,
            note,
        })
    }

    fn log(&mut self) -> Result<Log> {
        let op_count = self.u32()? as usize;
        if op_count == 0 {
            return Err(Error::Wire("log has no operations".into()));
        }
        let mut ops = Vec::with_capacity(op_count.min(1024));
        for _ in 0..op_count {
            ops.push(self.op()?);
        }

        let child_count = self.u32()? as usize;
        let mut logs = Vec::with_capacity(child_count.min(64));
        for _ in 0..child_count {
            logs.push(self.log()?);
        }

        let signature = match self.u8()? {
            0 => None,
            1 => {
                let len = self.u32()? as usize;
                Some(self.take(len)?.to_vec())
            }
            b => return Err(Error::Wire(format!("invalid signature flag {b}"))),
        };

        Ok(Log {
            ops,
            logs,
            signature,
        })
    }

    fn done(&self) -> Result<()> {
        if self.pos != self.buf.len() {
            return Err(Error::Wire("trailing bytes after journal".into()));
        }
        Ok(())
    }
}

/// Decode a single log (including descendants and signatures).
pub fn decode_log(bytes: &[u8]) -> Result<Log> {
    let mut r = Reader::new(bytes);
    let log = r.log()?;
    r.done()?;
    Ok(log)
}

/// Decode a full journal.
pub fn decode_journal(bytes: &[u8]) -> Result<Journal> {
    let mut r = Reader::new(bytes);
    if r.take(4)? != MAGIC.as_slice() {
        return Err(Error::Wire("bad magic".into()));
    }
    let author_id = r.string()?;
    let count = r.u32()? as usize;
    let mut logs = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        logs.push(r.log()?);
    }
    r.done()?;
    Ok(Journal::from_parts(author_id, logs))
}
