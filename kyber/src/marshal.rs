//! Encoding of composite values built from scalars, elements and fixed-width primitives.
//!
//! There are two ways in. Types with a static layout implement [`Marshal`] and drive an
//! [`Encoder`]/[`Decoder`] pair directly. Values whose layout is only known at runtime are
//! described by a [`Shape`] and carried as a [`Value`] tree, which the same codec walks.
//!
//! The format has no self-description: scalars and elements take their fixed group width,
//! primitives are big-endian, records are their fields in order and sequences carry no length
//! prefix (the length is part of the [`Shape`], or written explicitly by the caller).

use crate::encoding::EncodingError;
use crate::group::{Element, Group, Scalar};

/// Errors raised while encoding or decoding composite values.
#[derive(Debug, Clone, PartialEq, Eq, displaydoc::Display, thiserror::Error)]
pub enum MarshalError {
    /// {0}
    Encoding(#[from] EncodingError),
    /// input ended after {read} bytes while {wanted} more were needed
    UnexpectedEnd {
        /// Bytes consumed so far
        read: usize,
        /// Bytes still required
        wanted: usize,
    },
    /// {0} trailing bytes after the value
    Trailing(usize),
    /// value does not match the shape it is encoded with
    ShapeMismatch,
    /// no concrete type registered for the interface field `{0}`
    UnresolvedInterface(&'static str),
    /// integer does not fit in its wire width
    IntegerOverflow,
    /// invalid boolean byte {0}
    InvalidBool(u8),
}

/// Fixed-width primitive kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    /// Platform-sized unsigned integer, always 64 bits on the wire.
    Usize,
    /// Platform-sized signed integer, always 64 bits on the wire.
    Isize,
}

impl PrimitiveKind {
    /// Width on the wire in bytes.
    pub const fn width(self) -> usize {
        match self {
            PrimitiveKind::Bool | PrimitiveKind::U8 | PrimitiveKind::I8 => 1,
            PrimitiveKind::U16 | PrimitiveKind::I16 => 2,
            PrimitiveKind::U32 | PrimitiveKind::I32 | PrimitiveKind::F32 => 4,
            PrimitiveKind::U64
            | PrimitiveKind::I64
            | PrimitiveKind::F64
            | PrimitiveKind::Usize
            | PrimitiveKind::Isize => 8,
        }
    }
}

/// A fixed-width primitive value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Primitive {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Usize(usize),
    Isize(isize),
}

impl Primitive {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Primitive::Bool(_) => PrimitiveKind::Bool,
            Primitive::U8(_) => PrimitiveKind::U8,
            Primitive::U16(_) => PrimitiveKind::U16,
            Primitive::U32(_) => PrimitiveKind::U32,
            Primitive::U64(_) => PrimitiveKind::U64,
            Primitive::I8(_) => PrimitiveKind::I8,
            Primitive::I16(_) => PrimitiveKind::I16,
            Primitive::I32(_) => PrimitiveKind::I32,
            Primitive::I64(_) => PrimitiveKind::I64,
            Primitive::F32(_) => PrimitiveKind::F32,
            Primitive::F64(_) => PrimitiveKind::F64,
            Primitive::Usize(_) => PrimitiveKind::Usize,
            Primitive::Isize(_) => PrimitiveKind::Isize,
        }
    }
}

/// Runtime description of a composite layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    Scalar,
    Element,
    Primitive(PrimitiveKind),
    /// Fields in declaration order.
    Record(Vec<Shape>),
    /// `len` values of the same shape.
    Sequence(Box<Shape>, usize),
    /// A polymorphic field with no concrete type behind it. Only scalars and elements can be
    /// instantiated from the group, so decoding this always fails.
    Interface(&'static str),
}

impl Shape {
    pub fn sequence(item: Shape, len: usize) -> Self {
        Shape::Sequence(Box::new(item), len)
    }

    /// Encoded size in bytes under `group`, `None` if the shape contains an interface.
    pub fn encoded_len<G: Group>(&self, group: &G) -> Option<usize> {
        match self {
            Shape::Scalar => Some(group.scalar_len()),
            Shape::Element => Some(group.element_len()),
            Shape::Primitive(kind) => Some(kind.width()),
            Shape::Record(fields) => fields.iter().map(|f| f.encoded_len(group)).sum(),
            Shape::Sequence(item, len) => item.encoded_len(group).map(|l| l * len),
            Shape::Interface(_) => None,
        }
    }
}

/// A composite value over the group `G`.
pub enum Value<G: Group> {
    Scalar(G::Scalar),
    Element(G::Element),
    Primitive(Primitive),
    Record(Vec<Value<G>>),
    Sequence(Vec<Value<G>>),
}

impl<G: Group> Clone for Value<G> {
    fn clone(&self) -> Self {
        match self {
            Value::Scalar(s) => Value::Scalar(s.clone()),
            Value::Element(e) => Value::Element(e.clone()),
            Value::Primitive(p) => Value::Primitive(*p),
            Value::Record(v) => Value::Record(v.clone()),
            Value::Sequence(v) => Value::Sequence(v.clone()),
        }
    }
}

impl<G: Group> PartialEq for Value<G> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => a == b,
            (Value::Element(a), Value::Element(b)) => a == b,
            (Value::Primitive(a), Value::Primitive(b)) => a == b,
            (Value::Record(a), Value::Record(b)) | (Value::Sequence(a), Value::Sequence(b)) => a == b,
            _ => false,
        }
    }
}

impl<G: Group> core::fmt::Debug for Value<G> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Value::Scalar(s) => f.debug_tuple("Scalar").field(s).finish(),
            Value::Element(e) => f.debug_tuple("Element").field(e).finish(),
            Value::Primitive(p) => f.debug_tuple("Primitive").field(p).finish(),
            Value::Record(v) => f.debug_tuple("Record").field(v).finish(),
            Value::Sequence(v) => f.debug_tuple("Sequence").field(v).finish(),
        }
    }
}

impl<G: Group> Value<G> {
    /// The shape this value encodes with.
    pub fn shape(&self) -> Shape {
        match self {
            Value::Scalar(_) => Shape::Scalar,
            Value::Element(_) => Shape::Element,
            Value::Primitive(p) => Shape::Primitive(p.kind()),
            Value::Record(fields) => Shape::Record(fields.iter().map(Value::shape).collect()),
            Value::Sequence(items) => match items.first() {
                Some(first) => Shape::sequence(first.shape(), items.len()),
                None => Shape::sequence(Shape::Record(Vec::new()), 0),
            },
        }
    }
}

/// Appends encodings to a byte buffer.
#[derive(Debug, Default, Clone)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scalar<S: Scalar>(&mut self, s: &S) -> &mut Self {
        self.buf.extend_from_slice(&s.to_bytes());
        self
    }

    pub fn element<E: Element>(&mut self, e: &E) -> &mut Self {
        self.buf.extend_from_slice(&e.to_bytes());
        self
    }

    pub fn bool(&mut self, v: bool) -> &mut Self {
        self.buf.push(u8::from(v));
        self
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn u64(&mut self, v: u64) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    /// Writes a platform-sized length as a big-endian u32, failing if it does not fit.
    pub fn len_u32(&mut self, len: usize) -> Result<&mut Self, MarshalError> {
        let len = u32::try_from(len).map_err(|_| MarshalError::IntegerOverflow)?;
        Ok(self.u32(len))
    }

    /// Raw bytes with no length prefix.
    pub fn bytes(&mut self, b: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(b);
        self
    }

    /// Bytes preceded by their length as a big-endian u32.
    pub fn var_bytes(&mut self, b: &[u8]) -> Result<&mut Self, MarshalError> {
        self.len_u32(b.len())?;
        Ok(self.bytes(b))
    }

    pub fn primitive(&mut self, p: &Primitive) -> Result<&mut Self, MarshalError> {
        match *p {
            Primitive::Bool(v) => self.bool(v),
            Primitive::U8(v) => self.u8(v),
            Primitive::U16(v) => self.bytes(&v.to_be_bytes()),
            Primitive::U32(v) => self.u32(v),
            Primitive::U64(v) => self.u64(v),
            Primitive::I8(v) => self.bytes(&v.to_be_bytes()),
            Primitive::I16(v) => self.bytes(&v.to_be_bytes()),
            Primitive::I32(v) => self.bytes(&v.to_be_bytes()),
            Primitive::I64(v) => self.bytes(&v.to_be_bytes()),
            Primitive::F32(v) => self.bytes(&v.to_bits().to_be_bytes()),
            Primitive::F64(v) => self.bytes(&v.to_bits().to_be_bytes()),
            Primitive::Usize(v) => {
                let v = u64::try_from(v).map_err(|_| MarshalError::IntegerOverflow)?;
                self.u64(v)
            },
            Primitive::Isize(v) => {
                let v = i64::try_from(v).map_err(|_| MarshalError::IntegerOverflow)?;
                self.bytes(&v.to_be_bytes())
            },
        };
        Ok(self)
    }

    pub fn value<G: Group>(&mut self, v: &Value<G>) -> Result<&mut Self, MarshalError> {
        match v {
            Value::Scalar(s) => {
                self.scalar(s);
            },
            Value::Element(e) => {
                self.element(e);
            },
            Value::Primitive(p) => {
                self.primitive(p)?;
            },
            Value::Record(items) | Value::Sequence(items) => {
                for item in items {
                    self.value(item)?;
                }
            },
        }
        Ok(self)
    }

    pub fn marshal<G: Group, T: Marshal<G>>(&mut self, v: &T) -> Result<&mut Self, MarshalError> {
        v.marshal(self)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Reads encodings back from a byte slice, instantiating scalars and elements from `group`.
#[derive(Debug)]
pub struct Decoder<'a, G: Group> {
    group: &'a G,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a, G: Group> Decoder<'a, G> {
    pub fn new(group: &'a G, bytes: &'a [u8]) -> Self {
        Self { group, bytes, pos: 0 }
    }

    pub fn group(&self) -> &'a G {
        self.group
    }

    /// Bytes not consumed yet.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Fails unless the whole input has been consumed.
    pub fn finish(self) -> Result<(), MarshalError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(MarshalError::Trailing(n)),
        }
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], MarshalError> {
        if self.remaining() < n {
            return Err(MarshalError::UnexpectedEnd { read: self.pos, wanted: n });
        }
        let out = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], MarshalError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn scalar(&mut self) -> Result<G::Scalar, MarshalError> {
        let bytes = self.take(self.group.scalar_len())?;
        Ok(self.group.scalar_from_bytes(bytes)?)
    }

    pub fn element(&mut self) -> Result<G::Element, MarshalError> {
        let bytes = self.take(self.group.element_len())?;
        Ok(self.group.element_from_bytes(bytes)?)
    }

    pub fn bool(&mut self) -> Result<bool, MarshalError> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            b => Err(MarshalError::InvalidBool(b)),
        }
    }

    pub fn u8(&mut self) -> Result<u8, MarshalError> {
        Ok(self.array::<1>()?[0])
    }

    pub fn u32(&mut self) -> Result<u32, MarshalError> {
        self.array().map(u32::from_be_bytes)
    }

    pub fn u64(&mut self) -> Result<u64, MarshalError> {
        self.array().map(u64::from_be_bytes)
    }

    /// Reads a big-endian u32 length.
    pub fn len_u32(&mut self) -> Result<usize, MarshalError> {
        usize::try_from(self.u32()?).map_err(|_| MarshalError::IntegerOverflow)
    }

    /// Bytes written by [`Encoder::var_bytes`].
    pub fn var_bytes(&mut self) -> Result<Vec<u8>, MarshalError> {
        let len = self.len_u32()?;
        Ok(self.take(len)?.to_vec())
    }

    pub fn primitive(&mut self, kind: PrimitiveKind) -> Result<Primitive, MarshalError> {
        Ok(match kind {
            PrimitiveKind::Bool => Primitive::Bool(self.bool()?),
            PrimitiveKind::U8 => Primitive::U8(self.u8()?),
            PrimitiveKind::U16 => Primitive::U16(u16::from_be_bytes(self.array()?)),
            PrimitiveKind::U32 => Primitive::U32(self.u32()?),
            PrimitiveKind::U64 => Primitive::U64(self.u64()?),
            PrimitiveKind::I8 => Primitive::I8(i8::from_be_bytes(self.array()?)),
            PrimitiveKind::I16 => Primitive::I16(i16::from_be_bytes(self.array()?)),
            PrimitiveKind::I32 => Primitive::I32(i32::from_be_bytes(self.array()?)),
            PrimitiveKind::I64 => Primitive::I64(i64::from_be_bytes(self.array()?)),
            PrimitiveKind::F32 => Primitive::F32(f32::from_bits(self.u32()?)),
            PrimitiveKind::F64 => Primitive::F64(f64::from_bits(self.u64()?)),
            PrimitiveKind::Usize => {
                Primitive::Usize(usize::try_from(self.u64()?).map_err(|_| MarshalError::IntegerOverflow)?)
            },
            PrimitiveKind::Isize => {
                let v = i64::from_be_bytes(self.array()?);
                Primitive::Isize(isize::try_from(v).map_err(|_| MarshalError::IntegerOverflow)?)
            },
        })
    }

    /// Decodes a value of the given shape.
    pub fn value(&mut self, shape: &Shape) -> Result<Value<G>, MarshalError> {
        Ok(match shape {
            Shape::Scalar => Value::Scalar(self.scalar()?),
            Shape::Element => Value::Element(self.element()?),
            Shape::Primitive(kind) => Value::Primitive(self.primitive(*kind)?),
            Shape::Record(fields) => Value::Record(fields.iter().map(|f| self.value(f)).collect::<Result<_, _>>()?),
            Shape::Sequence(item, len) => {
                Value::Sequence((0..*len).map(|_| self.value(item)).collect::<Result<_, _>>()?)
            },
            Shape::Interface(name) => return Err(MarshalError::UnresolvedInterface(*name)),
        })
    }

    pub fn unmarshal<T: Marshal<G>>(&mut self) -> Result<T, MarshalError> {
        T::unmarshal(self)
    }

    /// `n` values of `T` back to back.
    pub fn many<T: Marshal<G>>(&mut self, n: usize) -> Result<Vec<T>, MarshalError> {
        (0..n).map(|_| T::unmarshal(self)).collect()
    }
}

/// Types with a static wire layout over the group `G`.
pub trait Marshal<G: Group>: Sized {
    fn marshal(&self, enc: &mut Encoder) -> Result<(), MarshalError>;
    fn unmarshal(dec: &mut Decoder<'_, G>) -> Result<Self, MarshalError>;

    /// Encodes `self` on its own.
    fn to_wire(&self) -> Result<Vec<u8>, MarshalError> {
        let mut enc = Encoder::new();
        self.marshal(&mut enc)?;
        Ok(enc.into_bytes())
    }

    /// Decodes a value that must span all of `bytes`.
    fn from_wire(group: &G, bytes: &[u8]) -> Result<Self, MarshalError> {
        let mut dec = Decoder::new(group, bytes);
        let v = Self::unmarshal(&mut dec)?;
        dec.finish()?;
        Ok(v)
    }
}

/// Encodes a dynamic value.
pub fn encode<G: Group>(value: &Value<G>) -> Result<Vec<u8>, MarshalError> {
    let mut enc = Encoder::new();
    enc.value(value)?;
    Ok(enc.into_bytes())
}

/// Decodes a dynamic value of `shape` spanning all of `bytes`.
pub fn decode<G: Group>(group: &G, shape: &Shape, bytes: &[u8]) -> Result<Value<G>, MarshalError> {
    let mut dec = Decoder::new(group, bytes);
    let v = dec.value(shape)?;
    dec.finish()?;
    Ok(v)
}

macro_rules! marshal_int {
    ($($ty:ty),*) => {$(
        impl<G: Group> Marshal<G> for $ty {
            fn marshal(&self, enc: &mut Encoder) -> Result<(), MarshalError> {
                enc.bytes(&self.to_be_bytes());
                Ok(())
            }

            fn unmarshal(dec: &mut Decoder<'_, G>) -> Result<Self, MarshalError> {
                dec.array().map(<$ty>::from_be_bytes)
            }
        }
    )*};
}

marshal_int!(u8, u16, u32, u64, i8, i16, i32, i64);

impl<G: Group> Marshal<G> for bool {
    fn marshal(&self, enc: &mut Encoder) -> Result<(), MarshalError> {
        enc.bool(*self);
        Ok(())
    }

    fn unmarshal(dec: &mut Decoder<'_, G>) -> Result<Self, MarshalError> {
        dec.bool()
    }
}

impl<G: Group> Marshal<G> for usize {
    fn marshal(&self, enc: &mut Encoder) -> Result<(), MarshalError> {
        enc.primitive(&Primitive::Usize(*self))?;
        Ok(())
    }

    fn unmarshal(dec: &mut Decoder<'_, G>) -> Result<Self, MarshalError> {
        match dec.primitive(PrimitiveKind::Usize)? {
            Primitive::Usize(v) => Ok(v),
            _ => Err(MarshalError::ShapeMismatch),
        }
    }
}

impl<G: Group, const N: usize> Marshal<G> for [u8; N] {
    fn marshal(&self, enc: &mut Encoder) -> Result<(), MarshalError> {
        enc.bytes(self);
        Ok(())
    }

    fn unmarshal(dec: &mut Decoder<'_, G>) -> Result<Self, MarshalError> {
        dec.array()
    }
}
