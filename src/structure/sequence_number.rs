use std::{fmt::Debug, hash::Hash, mem::size_of};

use num_derive::{FromPrimitive, NumOps, ToPrimitive};
use num_traits::NumOps;
use speedy::{Context, Readable, Reader, Writable, Writer};
#[allow(unused_imports)]
use log::{debug, error, trace, warn};

/// RTPS v2.3 section 8.3.5.4. Valid samples are numbered from 1 upwards
/// per writer.
#[derive(
  Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, NumOps, FromPrimitive, ToPrimitive,
)]
pub struct SequenceNumber(i64);

impl SequenceNumber {
  pub const SEQUENCENUMBER_UNKNOWN: SequenceNumber = SequenceNumber((std::u32::MAX as i64) << 32);

  pub const fn new(value: i64) -> SequenceNumber {
    SequenceNumber(value)
  }

  pub const fn zero() -> SequenceNumber {
    SequenceNumber(0)
  }

  /// Saturates at the largest representable number.
  pub fn next(self) -> SequenceNumber {
    SequenceNumber(self.0.saturating_add(1))
  }

  /// Saturates at the smallest representable number.
  pub fn prev(self) -> SequenceNumber {
    SequenceNumber(self.0.saturating_sub(1))
  }

  /// Valid samples are numbered from 1.
  pub fn is_valid(self) -> bool {
    self.0 >= 1
  }

  /// Inclusive iteration `begin ..= end`.
  pub fn range_inclusive(begin: Self, end: Self) -> SequenceNumberRange {
    SequenceNumberRange {
      next: if begin <= end { Some(begin) } else { None },
      end,
    }
  }
}

impl From<i64> for SequenceNumber {
  fn from(value: i64) -> Self {
    SequenceNumber(value)
  }
}

impl From<i32> for SequenceNumber {
  fn from(value: i32) -> Self {
    SequenceNumber(value.into())
  }
}

impl From<SequenceNumber> for i64 {
  fn from(sequence_number: SequenceNumber) -> Self {
    sequence_number.0
  }
}

impl Default for SequenceNumber {
  fn default() -> SequenceNumber {
    SequenceNumber(1)
  }
}

pub struct SequenceNumberRange {
  next: Option<SequenceNumber>,
  end: SequenceNumber,
}

impl Iterator for SequenceNumberRange {
  type Item = SequenceNumber;
  fn next(&mut self) -> Option<Self::Item> {
    let current = self.next?;
    self.next = if current < self.end {
      Some(current.next())
    } else {
      None
    };
    Some(current)
  }
}

mod sequence_number_checked {
  use super::SequenceNumber;
  checked_impl!(CheckedAdd, checked_add, SequenceNumber);
  checked_impl!(CheckedSub, checked_sub, SequenceNumber);
}

// RTPS v2.3 section 9.4.2.5: high 32 bits (signed) first, then the low 32
// bits (unsigned). Each word follows the submessage endianness.
// SequenceNumber(1) in little endian is 00 00 00 00 01 00 00 00.
impl<'a, C: Context> Readable<'a, C> for SequenceNumber {
  #[inline]
  fn read_from<R: Reader<'a, C>>(reader: &mut R) -> Result<Self, C::Error> {
    let high: i32 = reader.read_value()?;
    let low: u32 = reader.read_value()?;
    Ok(SequenceNumber((i64::from(high) << 32) + i64::from(low)))
  }

  #[inline]
  fn minimum_bytes_needed() -> usize {
    size_of::<Self>()
  }
}

impl<C: Context> Writable<C> for SequenceNumber {
  #[inline]
  fn write_to<T: ?Sized + Writer<C>>(&self, writer: &mut T) -> Result<(), C::Error> {
    writer.write_i32((self.0 >> 32) as i32)?;
    writer.write_u32(self.0 as u32)
  }
}

// ---------------------------------------------------------------

/// Fragment numbers inside one DATA_FRAG sample, counted from 1.
#[derive(
  Copy,
  Clone,
  Debug,
  Hash,
  PartialOrd,
  PartialEq,
  Ord,
  Eq,
  Readable,
  Writable,
  NumOps,
  FromPrimitive,
  ToPrimitive,
)]
pub struct FragmentNumber(u32);

impl FragmentNumber {
  pub const fn new(value: u32) -> FragmentNumber {
    FragmentNumber(value)
  }
}

impl Default for FragmentNumber {
  fn default() -> FragmentNumber {
    FragmentNumber(1)
  }
}

impl From<u32> for FragmentNumber {
  fn from(value: u32) -> Self {
    FragmentNumber(value)
  }
}

impl From<FragmentNumber> for u32 {
  fn from(fragment_number: FragmentNumber) -> Self {
    fragment_number.0
  }
}

// NumberSet<N> works in i64 offsets
impl From<i64> for FragmentNumber {
  fn from(value: i64) -> Self {
    FragmentNumber(value as u32)
  }
}

impl From<FragmentNumber> for i64 {
  fn from(fragment_number: FragmentNumber) -> Self {
    i64::from(fragment_number.0)
  }
}

mod fragment_number_checked {
  use super::FragmentNumber;
  checked_impl!(CheckedAdd, checked_add, FragmentNumber);
  checked_impl!(CheckedSub, checked_sub, FragmentNumber);
}

// ---------------------------------------------------------------

pub type SequenceNumberSet = NumberSet<SequenceNumber>;
pub type FragmentNumberSet = NumberSet<FragmentNumber>;

/// Bitmap over at most 256 consecutive numbers starting at `bitmap_base`.
///
/// Bits are numbered from MSB to LSB: bit 0 (MSB of `bitmap[0]`) stands for
/// `bitmap_base`, bit 31 (LSB of `bitmap[0]`) for `bitmap_base + 31`.
/// An empty set still carries a meaningful base.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct NumberSet<N>
where
  N: Clone + Debug + Hash + PartialEq + Eq + NumOps + From<i64>,
{
  bitmap_base: N,
  num_bits: u32,
  bitmap: Vec<u32>, // .len() == (num_bits + 31) / 32
}

impl<N> NumberSet<N>
where
  N: Clone + Copy + Debug + Hash + PartialEq + Eq + NumOps + From<i64> + Ord + PartialOrd,
  i64: From<N>,
{
  pub const MAX_BITS: u32 = 256;

  /// Set with room for `num_bits` numbers, none of them present. `num_bits`
  /// is clamped to 256.
  pub fn new(bitmap_base: N, num_bits: u32) -> NumberSet<N> {
    let num_bits = num_bits.min(Self::MAX_BITS);
    NumberSet::<N> {
      bitmap_base,
      num_bits,
      bitmap: vec![0; ((num_bits + 31) / 32) as usize],
    }
  }

  pub fn new_empty(bitmap_base: N) -> NumberSet<N> {
    NumberSet::<N>::new(bitmap_base, 0)
  }

  pub fn base(&self) -> N {
    self.bitmap_base
  }

  pub fn num_bits(&self) -> u32 {
    self.num_bits
  }

  pub fn bitmap(&self) -> &[u32] {
    &self.bitmap
  }

  pub fn is_empty(&self) -> bool {
    self.iter().next().is_none()
  }

  fn bit_position(&self, n: N) -> Option<u32> {
    let offset = i64::from(n).checked_sub(i64::from(self.bitmap_base))?;
    if (0..bit_offset(self.num_bits)).contains(&offset) {
      Some(offset as u32)
    } else {
      None
    }
  }

  pub fn insert(&mut self, n: N) {
    match self.bit_position(n) {
      Some(bit_pos) => self.bitmap[(bit_pos / 32) as usize] |= 1u32 << (31 - bit_pos % 32),
      None => error!("out of bounds .insert({:?}) to {:?}", n, self),
    }
  }

  pub fn contains(&self, n: N) -> bool {
    match self.bit_position(n) {
      Some(bit_pos) => self.bitmap[(bit_pos / 32) as usize] & (1u32 << (31 - bit_pos % 32)) != 0,
      None => false,
    }
  }

  pub fn iter(&self) -> NumberSetIter<N> {
    NumberSetIter::<N> {
      set: self,
      at_bit: 0,
    }
  }

  /// Bytes on the wire: base, bit count and the bitmap words.
  pub fn len_serialized(&self) -> usize {
    size_of::<N>() + 4 + 4 * self.bitmap.len()
  }
}

impl<'a, C: Context, N> Readable<'a, C> for NumberSet<N>
where
  N:
    Clone + Debug + Hash + PartialEq + Eq + NumOps + From<i64> + Ord + PartialOrd + Readable<'a, C>,
  i64: From<N>,
{
  #[inline]
  fn read_from<R: Reader<'a, C>>(reader: &mut R) -> Result<Self, C::Error> {
    let bitmap_base: N = reader.read_value()?;
    let num_bits: u32 = reader.read_value()?;
    if num_bits > 256 {
      return Err(speedy::Error::custom(format!("NumberSet numBits {} exceeds 256", num_bits)).into());
    }
    let word_count = (num_bits + 31) / 32;
    let mut bitmap: Vec<u32> = Vec::with_capacity(word_count as usize);
    for _ in 0..word_count {
      bitmap.push(reader.read_value()?);
    }
    Ok(NumberSet::<N> {
      bitmap_base,
      num_bits,
      bitmap,
    })
  }

  #[inline]
  fn minimum_bytes_needed() -> usize {
    size_of::<N>() + size_of::<u32>()
  }
}

impl<C: Context, N> Writable<C> for NumberSet<N>
where
  N: Clone + Debug + Hash + PartialEq + Eq + NumOps + From<i64> + Ord + PartialOrd + Writable<C>,
{
  #[inline]
  fn write_to<T: ?Sized + Writer<C>>(&self, writer: &mut T) -> Result<(), C::Error> {
    writer.write_value(&self.bitmap_base)?;
    writer.write_u32(self.num_bits)?;
    for word in self.bitmap.iter() {
      writer.write_u32(*word)?;
    }
    Ok(())
  }
}

// Outside the generic impls, where `i64: From<N>` would shadow `From<u32>`.
fn bit_offset(bit: u32) -> i64 {
  i64::from(bit)
}

pub struct NumberSetIter<'a, N>
where
  N: Clone + Debug + Hash + PartialEq + Eq + NumOps + From<i64>,
{
  set: &'a NumberSet<N>,
  at_bit: u32,
}

impl<'a, N> Iterator for NumberSetIter<'a, N>
where
  N: Clone + Copy + Debug + Hash + PartialEq + Eq + NumOps + From<i64> + Ord + PartialOrd,
  i64: From<N>,
{
  type Item = N;

  fn next(&mut self) -> Option<Self::Item> {
    while self.at_bit < self.set.num_bits {
      // bit indexing formula from RTPS spec v2.3 section 9.4.2.6
      let bit = self.at_bit;
      self.at_bit += 1;
      if self.set.bitmap[(bit / 32) as usize] & (1 << (31 - bit % 32)) != 0 {
        // members past the largest number do not exist
        let member = i64::from(self.set.bitmap_base).checked_add(bit_offset(bit))?;
        return Some(N::from(member));
      }
    }
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sequence_number_starts_by_default_from_one() {
    assert_eq!(SequenceNumber::from(1), SequenceNumber::default());
  }

  #[test]
  fn sequence_number_range_is_inclusive() {
    let range: Vec<i64> =
      SequenceNumber::range_inclusive(SequenceNumber::new(3), SequenceNumber::new(5))
        .map(i64::from)
        .collect();
    assert_eq!(range, vec![3, 4, 5]);
  }

  #[test]
  fn sequence_number_arithmetic_saturates() {
    let max = SequenceNumber::new(i64::MAX);
    assert_eq!(max.next(), max);
    assert_eq!(SequenceNumber::new(i64::MIN).prev(), SequenceNumber::new(i64::MIN));
    let range: Vec<SequenceNumber> =
      SequenceNumber::range_inclusive(SequenceNumber::new(i64::MAX - 1), max).collect();
    assert_eq!(range, vec![SequenceNumber::new(i64::MAX - 1), max]);
    assert_eq!(
      SequenceNumber::range_inclusive(SequenceNumber::new(2), SequenceNumber::new(1)).count(),
      0
    );
  }

  #[test]
  fn number_set_near_largest_number_stops_at_it() {
    let base = SequenceNumber::new(i64::MAX - 1);
    let mut set = SequenceNumberSet::new(base, 256);
    set.insert(base);
    set.insert(SequenceNumber::new(i64::MAX));
    // a decoded bitmap may claim members past i64::MAX
    set.bitmap[0] = u32::MAX;
    assert_eq!(
      set.iter().collect::<Vec<_>>(),
      vec![base, SequenceNumber::new(i64::MAX)]
    );
    assert!(!set.contains(SequenceNumber::new(i64::MIN)));
  }

  #[test]
  fn number_set_membership() {
    let mut set = SequenceNumberSet::new(SequenceNumber::new(10), 40);
    set.insert(SequenceNumber::new(10));
    set.insert(SequenceNumber::new(45));
    set.insert(SequenceNumber::new(50)); // out of range, ignored
    assert!(set.contains(SequenceNumber::new(10)));
    assert!(set.contains(SequenceNumber::new(45)));
    assert!(!set.contains(SequenceNumber::new(11)));
    assert!(!set.contains(SequenceNumber::new(50)));
    let members: Vec<SequenceNumber> = set.iter().collect();
    assert_eq!(members, vec![SequenceNumber::new(10), SequenceNumber::new(45)]);
  }

  #[test]
  fn number_set_is_clamped_to_256_bits() {
    let set = SequenceNumberSet::new(SequenceNumber::new(1), 1000);
    assert_eq!(set.num_bits(), 256);
    assert_eq!(set.bitmap().len(), 8);
  }

  #[test]
  fn number_set_rejects_oversized_bit_count() {
    let bytes: Vec<u8> = vec![
      0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, // base 1
      0x01, 0x01, 0x00, 0x00, // numBits 257
    ];
    assert!(SequenceNumberSet::read_from_buffer_with_ctx(
      speedy::Endianness::LittleEndian,
      &bytes
    )
    .is_err());
  }

  serialization_test!( type = FragmentNumber,
  {
      fragment_number_default,
      FragmentNumber::default(),
      le = [0x01, 0x00, 0x00, 0x00],
      be = [0x00, 0x00, 0x00, 0x01]
  },
  {
      fragment_number_non_zero,
      FragmentNumber::from(0xDEADBEEFu32),
      le = [0xEF, 0xBE, 0xAD, 0xDE],
      be = [0xDE, 0xAD, 0xBE, 0xEF]
  });

  serialization_test!( type = SequenceNumber,
  {
      sequence_number_default,
      SequenceNumber::default(),
      le = [0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00],
      be = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01]
  },
  {
      sequence_number_unknown,
      SequenceNumber::SEQUENCENUMBER_UNKNOWN,
      le = [0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00],
      be = [0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00]
  },
  {
      sequence_number_above_31_bits,
      SequenceNumber::from(0x0000_0001_8000_0000i64),
      le = [0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x80],
      be = [0x00, 0x00, 0x00, 0x01, 0x80, 0x00, 0x00, 0x00]
  });

  serialization_test!( type = SequenceNumberSet,
  {
      sequence_number_set_empty,
      SequenceNumberSet::new_empty(SequenceNumber::from(42)),
      le = [0x00, 0x00, 0x00, 0x00,  // bitmapBase
            0x2A, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00], // numBits
      be = [0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x2A,
            0x00, 0x00, 0x00, 0x00]
  },
  {
      sequence_number_set_first_and_last,
      {
        let mut set = SequenceNumberSet::new(SequenceNumber::from(1), 33);
        set.insert(SequenceNumber::from(1));
        set.insert(SequenceNumber::from(33));
        set
      },
      le = [0x00, 0x00, 0x00, 0x00,
            0x01, 0x00, 0x00, 0x00,
            0x21, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x80,
            0x00, 0x00, 0x00, 0x80],
      be = [0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x01,
            0x00, 0x00, 0x00, 0x21,
            0x80, 0x00, 0x00, 0x00,
            0x80, 0x00, 0x00, 0x00]
  });

  serialization_test!( type = FragmentNumberSet,
  {
      fragment_number_set_three_bits,
      {
        let mut set = FragmentNumberSet::new(FragmentNumber::from(1000u32), 3);
        set.insert(FragmentNumber::from(1000u32));
        set.insert(FragmentNumber::from(1002u32));
        set
      },
      le = [0xE8, 0x03, 0x00, 0x00,
            0x03, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0xA0],
      be = [0x00, 0x00, 0x03, 0xE8,
            0x00, 0x00, 0x00, 0x03,
            0xA0, 0x00, 0x00, 0x00]
  });
}
