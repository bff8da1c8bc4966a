pub mod parameter_list;
pub mod serialized_payload;

/// Zero bytes needed to bring `length` up to a multiple of four.
pub(crate) fn padding_needed(length: usize) -> usize {
  (4 - length % 4) % 4
}
