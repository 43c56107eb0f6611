//! Byte layouts of the file information record variants used by directory
//! enumeration and file queries.
//!
//! Records travel as raw bytes shaped exactly like the native structures:
//! little-endian fields and UTF-16LE filenames dangling off the end of a
//! fixed-size base. Each supported variant is described by four numbers, and
//! all buffer handling elsewhere in the engine goes through the helpers here
//! rather than variant-specific branching.

use byteorder::{ByteOrder, LittleEndian};
use num_derive::FromPrimitive;

/// File information class identifiers in the native convention.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, FromPrimitive)]
pub enum FileInformationClass {
    FileDirectoryInformation = 1,
    FileFullDirectoryInformation = 2,
    FileBothDirectoryInformation = 3,
    FileNameInformation = 9,
    FileNamesInformation = 12,
    FileAllInformation = 18,
    FileIdBothDirectoryInformation = 37,
    FileIdFullDirectoryInformation = 38,
    FileNormalizedNameInformation = 48,
}

/// Byte offset of the filename length field inside a bare file name
/// information record, as returned by queries by handle.
pub const FILE_NAME_INFORMATION_LENGTH_OFFSET: usize = 0;

/// Byte offset of the first filename character inside a bare file name
/// information record.
pub const FILE_NAME_INFORMATION_NAME_OFFSET: usize = 4;

/// Byte offset of the embedded name information record inside a composite
/// all-information record.
pub const FILE_ALL_INFORMATION_NAME_PART_OFFSET: usize = 96;

/// Encodes a filename as UTF-16LE bytes.
pub fn encode_file_name(file_name: &str) -> Vec<u8> {
    let mut encoded = Vec::with_capacity(file_name.len() * 2);
    for unit in file_name.encode_utf16() {
        encoded.extend_from_slice(&unit.to_le_bytes());
    }
    encoded
}

/// Decodes UTF-16LE bytes back into a filename. A trailing odd byte is
/// ignored.
pub fn decode_file_name(encoded: &[u8]) -> String {
    let units: Vec<u16> =
        encoded.chunks_exact(2).map(|pair| u16::from_le_bytes([pair[0], pair[1]])).collect();
    String::from_utf16_lossy(&units)
}

/// Describes the layout of one file information record variant: the size of
/// the fixed part and the offsets of the three fields the engine manipulates.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FileInformationStructLayout {
    information_class: FileInformationClass,
    base_size: usize,
    next_entry_offset_offset: usize,
    file_name_length_offset: usize,
    file_name_offset: usize,
}

impl FileInformationStructLayout {
    /// Retrieves the layout for an information class used in directory
    /// enumeration, or nothing for classes the enumeration pipeline does not
    /// support.
    pub fn for_information_class(
        information_class: FileInformationClass,
    ) -> Option<FileInformationStructLayout> {
        let (base_size, file_name_length_offset, file_name_offset) = match information_class {
            FileInformationClass::FileDirectoryInformation => (64, 60, 64),
            FileInformationClass::FileFullDirectoryInformation => (68, 60, 68),
            FileInformationClass::FileBothDirectoryInformation => (94, 60, 94),
            FileInformationClass::FileNamesInformation => (12, 8, 12),
            FileInformationClass::FileIdBothDirectoryInformation => (104, 60, 104),
            FileInformationClass::FileIdFullDirectoryInformation => (80, 60, 80),
            _ => return None,
        };

        Some(FileInformationStructLayout {
            information_class,
            base_size,
            next_entry_offset_offset: 0,
            file_name_length_offset,
            file_name_offset,
        })
    }

    pub fn information_class(&self) -> FileInformationClass {
        self.information_class
    }

    /// Size of the fixed part of the record, without the dangling filename.
    pub fn base_structure_size(&self) -> usize {
        self.base_size
    }

    /// Offset of the first filename byte within the record.
    pub fn file_name_offset(&self) -> usize {
        self.file_name_offset
    }

    /// Total record size for a filename of the given byte length.
    pub fn size_for_file_name_length(&self, file_name_length_bytes: usize) -> usize {
        self.base_size + file_name_length_bytes
    }

    /// Total size of the record at the start of the buffer, derived from its
    /// filename length field.
    pub fn size_of_record(&self, record: &[u8]) -> usize {
        self.size_for_file_name_length(self.read_file_name_length(record))
    }

    pub fn read_next_entry_offset(&self, record: &[u8]) -> usize {
        LittleEndian::read_u32(&record[self.next_entry_offset_offset..]) as usize
    }

    pub fn write_next_entry_offset(&self, record: &mut [u8], next_entry_offset: usize) {
        LittleEndian::write_u32(
            &mut record[self.next_entry_offset_offset..],
            next_entry_offset as u32,
        );
    }

    pub fn clear_next_entry_offset(&self, record: &mut [u8]) {
        self.write_next_entry_offset(record, 0);
    }

    /// Points the record's next-entry-offset at the position immediately
    /// after the record, where the following one will be written.
    pub fn update_next_entry_offset(&self, record: &mut [u8]) {
        let size = self.size_of_record(record);
        self.write_next_entry_offset(record, size);
    }

    /// Filename length in bytes, as recorded in the length field.
    pub fn read_file_name_length(&self, record: &[u8]) -> usize {
        LittleEndian::read_u32(&record[self.file_name_length_offset..]) as usize
    }

    pub fn write_file_name_length(&self, record: &mut [u8], file_name_length_bytes: usize) {
        LittleEndian::write_u32(
            &mut record[self.file_name_length_offset..],
            file_name_length_bytes as u32,
        );
    }

    /// Decodes the record's filename. The filename field may extend past the
    /// end of the buffer, in which case only the contained part is decoded.
    pub fn read_file_name(&self, record: &[u8]) -> String {
        let length = self.read_file_name_length(record);
        let available = record.len().saturating_sub(self.file_name_offset);
        if available == 0 {
            return String::new();
        }
        let end = self.file_name_offset + length.min(available);
        decode_file_name(&record[self.file_name_offset..end])
    }

    /// Writes the filename into the record, truncating to the buffer's
    /// capacity, and records the filename's full byte length in the length
    /// field regardless of truncation. Returns the number of filename bytes
    /// actually written.
    pub fn write_file_name(&self, record: &mut [u8], file_name: &str) -> usize {
        let encoded = encode_file_name(file_name);
        let capacity = record.len().saturating_sub(self.file_name_offset);
        let written = encoded.len().min(capacity & !1);
        if written > 0 {
            record[self.file_name_offset..self.file_name_offset + written]
                .copy_from_slice(&encoded[..written]);
        }
        self.write_file_name_length(record, encoded.len());
        written
    }
}

/// Reads the filename length field of a bare file name information record.
pub fn read_name_information_length(buffer: &[u8]) -> usize {
    LittleEndian::read_u32(&buffer[FILE_NAME_INFORMATION_LENGTH_OFFSET..]) as usize
}

/// Reads the filename from a bare file name information record, truncated to
/// what the buffer actually contains.
pub fn read_name_information_file_name(buffer: &[u8]) -> String {
    let length = LittleEndian::read_u32(&buffer[FILE_NAME_INFORMATION_LENGTH_OFFSET..]) as usize;
    let available = buffer.len().saturating_sub(FILE_NAME_INFORMATION_NAME_OFFSET);
    if available == 0 {
        return String::new();
    }
    let end = FILE_NAME_INFORMATION_NAME_OFFSET + length.min(available);
    decode_file_name(&buffer[FILE_NAME_INFORMATION_NAME_OFFSET..end])
}

/// Writes a filename into a bare file name information record, truncating to
/// capacity, and stores the full byte length in the length field. Returns the
/// number of filename bytes actually written.
pub fn write_name_information_file_name(buffer: &mut [u8], file_name: &str) -> usize {
    let encoded = encode_file_name(file_name);
    let capacity = buffer.len().saturating_sub(FILE_NAME_INFORMATION_NAME_OFFSET);
    let written = encoded.len().min(capacity & !1);
    if written > 0 {
        buffer[FILE_NAME_INFORMATION_NAME_OFFSET..FILE_NAME_INFORMATION_NAME_OFFSET + written]
            .copy_from_slice(&encoded[..written]);
    }
    LittleEndian::write_u32(
        &mut buffer[FILE_NAME_INFORMATION_LENGTH_OFFSET..],
        encoded.len() as u32,
    );
    written
}
