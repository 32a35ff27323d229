//! Executable artifact representation and serialization.
//!
//! [`Executable`] bundles a compiled instruction stream with its static data
//! segment. The data segment holds interned string literals; the VM copies it
//! verbatim to address 0 of the process memory image at load. Memory-mapped
//! floats in the image are little-endian, and so is the artifact encoding.

use crate::process::errors::ArtifactError;
use crate::process::isa::{Instruction, Opcode};
use crate::types::encoding::{Decode, DecodeError, Encode, EncodeSink};

/// Magic bytes identifying a serialized executable.
const MAGIC: &[u8; 6] = b"OPT_BC";

/// Current artifact format version.
const CURRENT_VERSION: Version = Version::new(0, 2, 0);

/// Semantic version for artifact format compatibility.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Version {
    major: u8,
    minor: u8,
    patch: u8,
}

impl Version {
    /// Creates a new version with the given components.
    const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl Encode for Version {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        self.major.encode(out);
        self.minor.encode(out);
        self.patch.encode(out);
    }
}

impl Decode for Version {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            major: u8::decode(input)?,
            minor: u8::decode(input)?,
            patch: u8::decode(input)?,
        })
    }
}

impl Encode for Instruction {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        (self.opcode as u8).encode(out);
        self.arg.encode(out);
    }
}

impl Decode for Instruction {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        let byte = u8::decode(input)?;
        let opcode = Opcode::try_from(byte).map_err(|_| DecodeError::InvalidValue)?;
        let arg = Option::<f64>::decode(input)?;
        Ok(Instruction { opcode, arg })
    }
}

/// Compiled program with its static data segment.
///
/// This is the contractual on-disk shape of an executable file: the
/// instruction stream plus the byte buffer of interned string literals that
/// the VM maps to low memory on process start.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Executable {
    /// Flat instruction stream; jump arguments index into it.
    pub bytecode: Vec<Instruction>,
    /// Interned string literals, referenced by byte offset.
    pub data: Vec<u8>,
}

impl Executable {
    /// Creates an executable from compiled components.
    pub fn new(bytecode: Vec<Instruction>, data: Vec<u8>) -> Self {
        Self { bytecode, data }
    }

    /// Serializes the executable to a portable binary format.
    ///
    /// The output includes a magic header and version for compatibility
    /// checking.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        MAGIC.encode(&mut out);
        CURRENT_VERSION.encode(&mut out);
        self.bytecode.encode(&mut out);
        self.data.encode(&mut out);
        out
    }

    /// Deserializes an executable from its binary representation.
    ///
    /// Validates the magic header and version, rejecting artifacts from
    /// incompatible format versions.
    pub fn from_bytes(mut input: &[u8]) -> Result<Self, ArtifactError> {
        if input.len() < MAGIC.len() {
            return Err(ArtifactError::Truncated);
        }

        if &<[u8; 6]>::decode(&mut input).map_err(|_| ArtifactError::Truncated)? != MAGIC {
            return Err(ArtifactError::BadMagic);
        }

        if Version::decode(&mut input).map_err(|_| ArtifactError::Truncated)? != CURRENT_VERSION {
            return Err(ArtifactError::UnsupportedVersion);
        }

        let bytecode = decode_instructions(&mut input)?;
        let data = Vec::<u8>::decode(&mut input).map_err(|_| ArtifactError::Malformed)?;

        if !input.is_empty() {
            return Err(ArtifactError::TrailingBytes);
        }
        Ok(Self { bytecode, data })
    }
}

/// Decodes the instruction stream, surfacing unknown opcode bytes precisely.
fn decode_instructions(input: &mut &[u8]) -> Result<Vec<Instruction>, ArtifactError> {
    let len = usize::decode(input).map_err(|_| ArtifactError::Malformed)?;
    let mut out = Vec::with_capacity(len.min(input.len()));
    for _ in 0..len {
        let byte = u8::decode(input).map_err(|_| ArtifactError::Malformed)?;
        let opcode = Opcode::try_from(byte)?;
        let arg = Option::<f64>::decode(input).map_err(|_| ArtifactError::Malformed)?;
        out.push(Instruction { opcode, arg });
    }
    Ok(out)
}
