use crate::error::Result;
use crate::reader::WireReader;
use crate::writer::WireWriter;

/// Sequence counts come off the wire; cap the up-front allocation and let
/// the vector grow normally past it.
const MAX_SEQUENCE_PREALLOC: usize = 1024;

/// Serialize a value into a [`WireWriter`].
///
/// Generated records implement this by encoding their fields in declaration
/// order; generated enums encode their zero-based declaration index as i32.
pub trait Encode {
    fn encode(&self, writer: &mut WireWriter);
}

/// Deserialize a value from a [`WireReader`], consuming exactly the bytes
/// the matching [`Encode`] implementation produces.
pub trait Decode: Sized {
    fn decode(reader: &mut WireReader<'_>) -> Result<Self>;
}

macro_rules! impl_wire_primitive {
    ($ty:ty, $put:ident, $get:ident) => {
        impl Encode for $ty {
            fn encode(&self, writer: &mut WireWriter) {
                writer.$put(*self);
            }
        }

        impl Decode for $ty {
            fn decode(reader: &mut WireReader<'_>) -> Result<Self> {
                reader.$get()
            }
        }
    };
}

impl_wire_primitive!(u8, put_u8, get_u8);
impl_wire_primitive!(i8, put_i8, get_i8);
impl_wire_primitive!(u16, put_u16, get_u16);
impl_wire_primitive!(i16, put_i16, get_i16);
impl_wire_primitive!(u32, put_u32, get_u32);
impl_wire_primitive!(i32, put_i32, get_i32);
impl_wire_primitive!(u64, put_u64, get_u64);
impl_wire_primitive!(i64, put_i64, get_i64);
impl_wire_primitive!(f32, put_f32, get_f32);
impl_wire_primitive!(f64, put_f64, get_f64);
impl_wire_primitive!(bool, put_bool, get_bool);

impl Encode for String {
    fn encode(&self, writer: &mut WireWriter) {
        writer.put_str(self);
    }
}

impl Decode for String {
    fn decode(reader: &mut WireReader<'_>) -> Result<Self> {
        reader.get_str()
    }
}

impl Encode for str {
    fn encode(&self, writer: &mut WireWriter) {
        writer.put_str(self);
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, writer: &mut WireWriter) {
        writer.put_u32(self.len() as u32);
        for item in self {
            item.encode(writer);
        }
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(reader: &mut WireReader<'_>) -> Result<Self> {
        let count = reader.get_u32()? as usize;
        let mut items = Vec::with_capacity(count.min(MAX_SEQUENCE_PREALLOC));
        for _ in 0..count {
            items.push(T::decode(reader)?);
        }
        Ok(items)
    }
}
