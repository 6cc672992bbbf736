//! Canonical and wire encodings.
//!
//! Every field is `u32 BE length || bytes`. Integers are minimal big-endian
//! with zero encoded as the empty string, so each value has exactly one
//! encoding. The canonical encoding (what gets hashed) covers
//! `nonce, sender, recipient, value, parents, gas_limit, gas_price, payload,
//! timestamp`. The wire encoding appends the signature field, the public-key
//! field and the 32-byte claimed hash.

use dagnet_types::{Address, Amount, CurveId, PublicKey, Signature, Timestamp, TxHash};

use crate::error::TransactionError;
use crate::Transaction;

pub(crate) fn put_field(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

fn minimal_u64(v: u64) -> Vec<u8> {
    let bytes = v.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[first..].to_vec()
}

pub(crate) fn encode_canonical(tx: &Transaction) -> Vec<u8> {
    let mut out = Vec::with_capacity(128 + tx.parents.len() * TxHash::LEN + tx.payload.len());
    put_field(&mut out, &minimal_u64(tx.nonce));
    put_field(&mut out, tx.sender.as_bytes());
    put_field(&mut out, tx.recipient.as_bytes());
    put_field(&mut out, &tx.value.to_be_bytes());
    let mut parents = Vec::with_capacity(tx.parents.len() * TxHash::LEN);
    for p in &tx.parents {
        parents.extend_from_slice(p.as_bytes());
    }
    put_field(&mut out, &parents);
    put_field(&mut out, &minimal_u64(tx.gas_limit));
    put_field(&mut out, &minimal_u64(tx.gas_price));
    put_field(&mut out, &tx.payload);
    put_field(&mut out, &minimal_u64(tx.timestamp.as_nanos()));
    out
}

pub(crate) fn encode_wire(tx: &Transaction) -> Vec<u8> {
    let mut out = encode_canonical(tx);
    match &tx.signature {
        Some(sig) => {
            let mut field = Vec::with_capacity(1 + 32 + 8 + sig.r.len() + sig.s.len());
            field.push(sig.curve.to_byte());
            field.extend_from_slice(&sig.digest);
            put_field(&mut field, &sig.r);
            put_field(&mut field, &sig.s);
            put_field(&mut out, &field);
        }
        None => put_field(&mut out, &[]),
    }
    match &tx.sender_public_key {
        Some(pk) => put_field(&mut out, pk.as_bytes()),
        None => put_field(&mut out, &[]),
    }
    out.extend_from_slice(tx.hash.as_bytes());
    out
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize, field: &'static str) -> Result<&'a [u8], TransactionError> {
        if self.remaining() < n {
            return Err(TransactionError::Truncated {
                field,
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn field(&mut self, field: &'static str) -> Result<&'a [u8], TransactionError> {
        let len_bytes = self.take(4, field)?;
        let len = u32::from_be_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]);
        self.take(len as usize, field)
    }

    fn uint(&mut self, field: &'static str) -> Result<u64, TransactionError> {
        let bytes = self.field(field)?;
        if bytes.len() > 8 {
            return Err(TransactionError::InvalidLength {
                field,
                expected: 8,
                got: bytes.len(),
            });
        }
        if bytes.first() == Some(&0) {
            return Err(TransactionError::NonMinimalInteger(field));
        }
        Ok(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
    }

    fn fixed<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], TransactionError> {
        let bytes = self.field(field)?;
        bytes.try_into().map_err(|_| TransactionError::InvalidLength {
            field,
            expected: N,
            got: bytes.len(),
        })
    }
}

fn decode_signature(bytes: &[u8]) -> Result<Option<Signature>, TransactionError> {
    if bytes.is_empty() {
        return Ok(None);
    }
    let mut r = Reader::new(bytes);
    let tag = r.take(1, "signature curve")?[0];
    let curve = CurveId::from_byte(tag).ok_or(TransactionError::UnknownCurve(tag))?;
    let mut digest = [0u8; 32];
    digest.copy_from_slice(r.take(32, "signature digest")?);
    let sig_r = r.field("signature r")?;
    let sig_s = r.field("signature s")?;
    for (name, part) in [("signature r", sig_r), ("signature s", sig_s)] {
        if part.len() != curve.scalar_len() {
            return Err(TransactionError::InvalidLength {
                field: name,
                expected: curve.scalar_len(),
                got: part.len(),
            });
        }
    }
    if r.remaining() != 0 {
        return Err(TransactionError::TrailingBytes(r.remaining()));
    }
    Ok(Some(Signature {
        curve,
        digest,
        r: sig_r.to_vec(),
        s: sig_s.to_vec(),
    }))
}

/// Strict inverse of [`encode_wire`]. Does not check the claimed hash.
pub(crate) fn decode_wire(bytes: &[u8]) -> Result<Transaction, TransactionError> {
    let mut r = Reader::new(bytes);
    let nonce = r.uint("nonce")?;
    let sender = Address::new(r.fixed::<20>("sender")?);
    let recipient = Address::new(r.fixed::<20>("recipient")?);
    let value = Amount::from_be_bytes(r.field("value")?)
        .map_err(|_| TransactionError::NonMinimalInteger("value"))?;

    let parent_bytes = r.field("parents")?;
    if parent_bytes.len() % TxHash::LEN != 0 {
        return Err(TransactionError::InvalidLength {
            field: "parents",
            expected: (parent_bytes.len() / TxHash::LEN + 1) * TxHash::LEN,
            got: parent_bytes.len(),
        });
    }
    let parents = parent_bytes
        .chunks_exact(TxHash::LEN)
        .map(|c| {
            let mut h = [0u8; 32];
            h.copy_from_slice(c);
            TxHash::new(h)
        })
        .collect();

    let gas_limit = r.uint("gas_limit")?;
    let gas_price = r.uint("gas_price")?;
    let payload = r.field("payload")?.to_vec();
    let timestamp = Timestamp::from_nanos(r.uint("timestamp")?);

    let signature = decode_signature(r.field("signature")?)?;
    let pk = r.field("public key")?;
    let sender_public_key = (!pk.is_empty()).then(|| PublicKey(pk.to_vec()));

    let mut hash = [0u8; 32];
    hash.copy_from_slice(r.take(32, "hash")?);
    if r.remaining() != 0 {
        return Err(TransactionError::TrailingBytes(r.remaining()));
    }

    Ok(Transaction {
        nonce,
        sender,
        recipient,
        value,
        parents,
        gas_limit,
        gas_price,
        payload,
        timestamp,
        sender_public_key,
        signature,
        hash: TxHash::new(hash),
    })
}
