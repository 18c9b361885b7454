// Copyright 2025 Irreducible Inc.
//! Little-endian byte (de)serialization used by the binary circuit readers.

use bytes::{Buf, BufMut};
use num_bigint::BigUint;
use thiserror::Error;

/// Serialize a value into a little-endian byte stream.
pub trait SerializeBytes {
	fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError>;
}

/// Deserialize a value from a little-endian byte stream.
pub trait DeserializeBytes {
	fn deserialize(read_buf: impl Buf) -> Result<Self, SerializationError>
	where
		Self: Sized;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SerializationError {
	#[error("Write buffer is full")]
	WriteBufferFull,
	#[error("Not enough data in read buffer to deserialize")]
	NotEnoughBytes,
	#[error("Invalid magic bytes: expected {expected:?}, got {actual:?}")]
	InvalidMagic { expected: [u8; 4], actual: [u8; 4] },
	#[error("Unsupported {name} version {version}")]
	UnsupportedVersion { name: &'static str, version: u32 },
	#[error("Invalid construction of {name}")]
	InvalidConstruction { name: &'static str },
	#[error("u64 {value} does not fit into usize")]
	UsizeOverflow { value: u64 },
}

impl<T: SerializeBytes + ?Sized> SerializeBytes for &T {
	fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError> {
		(**self).serialize(write_buf)
	}
}

impl SerializeBytes for u64 {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		assert_enough_space_for(&write_buf, std::mem::size_of::<Self>())?;
		write_buf.put_u64_le(*self);
		Ok(())
	}
}

impl DeserializeBytes for u64 {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError>
	where
		Self: Sized,
	{
		assert_enough_data_for(&read_buf, std::mem::size_of::<Self>())?;
		Ok(read_buf.get_u64_le())
	}
}

impl SerializeBytes for u32 {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		assert_enough_space_for(&write_buf, std::mem::size_of::<Self>())?;
		write_buf.put_u32_le(*self);
		Ok(())
	}
}

impl DeserializeBytes for u32 {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError>
	where
		Self: Sized,
	{
		assert_enough_data_for(&read_buf, std::mem::size_of::<Self>())?;
		Ok(read_buf.get_u32_le())
	}
}

impl<const N: usize> SerializeBytes for [u8; N] {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		assert_enough_space_for(&write_buf, N)?;
		write_buf.put_slice(self);
		Ok(())
	}
}

impl<const N: usize> DeserializeBytes for [u8; N] {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError>
	where
		Self: Sized,
	{
		assert_enough_data_for(&read_buf, N)?;
		let mut ret = [0u8; N];
		read_buf.copy_to_slice(&mut ret);
		Ok(ret)
	}
}

/// Reads a `u64` length field and converts it into a `usize`.
pub fn deserialize_len(read_buf: impl Buf) -> Result<usize, SerializationError> {
	let value = u64::deserialize(read_buf)?;
	usize::try_from(value).map_err(|_| SerializationError::UsizeOverflow { value })
}

/// Reads an unsigned integer stored as `n_bytes` little-endian bytes.
pub fn deserialize_biguint_le(
	mut read_buf: impl Buf,
	n_bytes: usize,
) -> Result<BigUint, SerializationError> {
	assert_enough_data_for(&read_buf, n_bytes)?;
	let bytes = read_buf.copy_to_bytes(n_bytes);
	Ok(BigUint::from_bytes_le(&bytes))
}

/// Writes `value` as exactly `n_bytes` little-endian bytes.
///
/// Fails with [`SerializationError::InvalidConstruction`] when the value does not fit.
pub fn serialize_biguint_le(
	value: &BigUint,
	n_bytes: usize,
	mut write_buf: impl BufMut,
) -> Result<(), SerializationError> {
	let mut bytes = value.to_bytes_le();
	if bytes.len() > n_bytes {
		return Err(SerializationError::InvalidConstruction { name: "BigUint" });
	}
	bytes.resize(n_bytes, 0);
	assert_enough_space_for(&write_buf, n_bytes)?;
	write_buf.put_slice(&bytes);
	Ok(())
}

/// Consumes four bytes and checks that they equal `expected`.
pub fn expect_magic(read_buf: impl Buf, expected: [u8; 4]) -> Result<(), SerializationError> {
	let actual = <[u8; 4]>::deserialize(read_buf)?;
	if actual != expected {
		return Err(SerializationError::InvalidMagic { expected, actual });
	}
	Ok(())
}

#[inline]
pub fn assert_enough_space_for(
	write_buf: &impl BufMut,
	size: usize,
) -> Result<(), SerializationError> {
	if write_buf.remaining_mut() < size {
		return Err(SerializationError::WriteBufferFull);
	}
	Ok(())
}

#[inline]
pub fn assert_enough_data_for(read_buf: &impl Buf, size: usize) -> Result<(), SerializationError> {
	if read_buf.remaining() < size {
		return Err(SerializationError::NotEnoughBytes);
	}
	Ok(())
}
