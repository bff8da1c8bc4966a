#![cfg(test)]

pub(crate) mod test_data;

// Generates one test module per case. Each module checks that the value
// serializes to the given little- and big-endian byte arrays and that those
// arrays deserialize back to the value.
macro_rules! serialization_test {
  (type = $type:ty, $({ $name:ident, $original:expr, le = $le:expr, be = $be:expr }),+) => {
    $(mod $name {
      use super::*;
      use speedy::{Endianness, Readable, Writable};

      #[test]
      fn serialize_little_endian() {
        let original: $type = $original;
        let expected: Vec<u8> = $le.to_vec();
        let serialized = original
          .write_to_vec_with_ctx(Endianness::LittleEndian)
          .unwrap();
        assert_eq!(expected, serialized);
      }

      #[test]
      fn serialize_big_endian() {
        let original: $type = $original;
        let expected: Vec<u8> = $be.to_vec();
        let serialized = original
          .write_to_vec_with_ctx(Endianness::BigEndian)
          .unwrap();
        assert_eq!(expected, serialized);
      }

      #[test]
      fn deserialize_little_endian() {
        let original: $type = $original;
        let bytes: Vec<u8> = $le.to_vec();
        let deserialized =
          <$type>::read_from_buffer_with_ctx(Endianness::LittleEndian, &bytes).unwrap();
        assert_eq!(original, deserialized);
      }

      #[test]
      fn deserialize_big_endian() {
        let original: $type = $original;
        let bytes: Vec<u8> = $be.to_vec();
        let deserialized =
          <$type>::read_from_buffer_with_ctx(Endianness::BigEndian, &bytes).unwrap();
        assert_eq!(original, deserialized);
      }
    })+
  };
}
