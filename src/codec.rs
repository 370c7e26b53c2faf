//! E310 frame codec: the single command serializer and all response parsers.
//!
//! Frame layout: `Len | Addr | Cmd | Data[..] | CRC_lo | CRC_hi`, where
//! `Len` counts every byte after itself (total on wire is `Len + 1`).
//! The [`Codec`] owns the reader address and a 256-byte transmit buffer;
//! every build call rewrites the buffer in place.

use log::debug;

use crate::command::Command;
use crate::crc::{crc16_wire, verify_frame};
use crate::types::{
    Error, InventoryStats, ReaderInfo, ResponseHeader, TagData, MAX_EPC_LENGTH, MAX_FRAME_SIZE,
    MAX_TID_LENGTH, MIN_RESPONSE_SIZE,
};

/// Payload bytes may occupy indices 3..=253; indices 254/255 hold the CRC
/// of a maximum-size frame.
const MAX_PAYLOAD_END: usize = MAX_FRAME_SIZE - 2;

pub struct Codec {
    reader_addr: u8,
    tx_buffer: [u8; MAX_FRAME_SIZE],
    tx_len: usize,
}

impl Codec {
    pub fn new(reader_addr: u8) -> Self {
        Self {
            reader_addr,
            tx_buffer: [0; MAX_FRAME_SIZE],
            tx_len: 0,
        }
    }

    pub fn reader_addr(&self) -> u8 {
        self.reader_addr
    }

    pub fn set_reader_addr(&mut self, addr: u8) {
        self.reader_addr = addr;
    }

    /// The most recently built frame.
    pub fn tx_frame(&self) -> &[u8] {
        &self.tx_buffer[..self.tx_len]
    }

    /// Serialize a command into the transmit buffer and return the frame.
    pub fn build(&mut self, command: &Command) -> Result<&[u8], Error> {
        let mut idx = 3;
        self.write_payload(command, &mut idx)?;

        // Len counts Addr + Cmd + Data + CRC, everything after itself.
        self.tx_buffer[0] = (idx + 1) as u8;
        self.tx_buffer[1] = self.reader_addr;
        self.tx_buffer[2] = command.code();

        let crc = crc16_wire(&self.tx_buffer[..idx]);
        self.tx_buffer[idx] = (crc & 0xFF) as u8;
        self.tx_buffer[idx + 1] = (crc >> 8) as u8;
        self.tx_len = idx + 2;

        debug!(
            "Built {} frame: {} bytes",
            crate::types::command_name(command.code()),
            self.tx_len
        );
        Ok(&self.tx_buffer[..self.tx_len])
    }

    fn put(&mut self, idx: &mut usize, b: u8) -> Result<(), Error> {
        if *idx >= MAX_PAYLOAD_END {
            return Err(Error::BufferOverflow);
        }
        self.tx_buffer[*idx] = b;
        *idx += 1;
        Ok(())
    }

    fn put_slice(&mut self, idx: &mut usize, data: &[u8]) -> Result<(), Error> {
        if *idx + data.len() > MAX_PAYLOAD_END {
            return Err(Error::BufferOverflow);
        }
        self.tx_buffer[*idx..*idx + data.len()].copy_from_slice(data);
        *idx += data.len();
        Ok(())
    }

    fn write_payload(&mut self, command: &Command, idx: &mut usize) -> Result<(), Error> {
        match command {
            Command::TagInventory(p) => {
                let mask_bytes = (p.mask_len as usize + 7) / 8;
                if p.mask_data.len() < mask_bytes {
                    return Err(Error::InvalidParam(format!(
                        "mask data holds {} bytes, mask length needs {}",
                        p.mask_data.len(),
                        mask_bytes
                    )));
                }
                self.put(idx, p.q_value)?;
                self.put(idx, p.session)?;
                self.put(idx, p.mask_mem)?;
                self.put(idx, (p.mask_addr >> 8) as u8)?;
                self.put(idx, (p.mask_addr & 0xFF) as u8)?;
                self.put(idx, p.mask_len)?;
                self.put_slice(idx, &p.mask_data[..mask_bytes])?;
                self.put(idx, p.tid_addr)?;
                self.put(idx, p.tid_len)?;
                self.put(idx, p.target)?;
                if p.antenna != 0 {
                    self.put(idx, p.antenna)?;
                }
                if p.scan_time != 0 {
                    self.put(idx, p.scan_time)?;
                }
            }
            Command::TagInventoryDefault => {
                // Default parameter block observed from the vendor tool:
                // Q=4, smart session, no mask, 5 s scan time.
                self.put_slice(idx, &[0x04, 0xFE, 0x00, 0x80, 0x32])?;
            }
            Command::ReadData(p) => {
                if p.epc.is_empty() {
                    // Mask mode: ENum marker 0xFF, tag addressed by mask.
                    let mask_bytes = (p.mask_len as usize + 7) / 8;
                    if p.mask_data.len() < mask_bytes {
                        return Err(Error::InvalidParam("mask data shorter than mask length".into()));
                    }
                    self.put(idx, 0xFF)?;
                    self.put(idx, p.mem_bank)?;
                    self.put(idx, p.word_ptr)?;
                    self.put(idx, p.word_count)?;
                    self.put_slice(idx, &p.password)?;
                    self.put(idx, p.mask_mem)?;
                    self.put(idx, (p.mask_addr >> 8) as u8)?;
                    self.put(idx, (p.mask_addr & 0xFF) as u8)?;
                    self.put(idx, p.mask_len)?;
                    self.put_slice(idx, &p.mask_data[..mask_bytes])?;
                } else {
                    let epc_words = ((p.epc.len() + 1) / 2) as u8;
                    self.put(idx, epc_words)?;
                    self.put_slice(idx, &p.epc)?;
                    self.put(idx, p.mem_bank)?;
                    self.put(idx, p.word_ptr)?;
                    self.put(idx, p.word_count)?;
                    self.put_slice(idx, &p.password)?;
                }
            }
            Command::WriteData(p) => {
                let epc_words = ((p.epc.len() + 1) / 2) as u8;
                self.put(idx, p.word_count)?;
                self.put(idx, epc_words)?;
                self.put_slice(idx, &p.epc)?;
                self.put(idx, p.mem_bank)?;
                self.put(idx, p.word_ptr)?;
                self.put_slice(idx, &p.data)?;
                self.put_slice(idx, &p.password)?;
            }
            Command::WriteEpc(p) => {
                let old_words = ((p.old_epc.len() + 1) / 2) as u8;
                let new_words = ((p.new_epc.len() + 1) / 2) as u8;
                self.put(idx, old_words)?;
                self.put_slice(idx, &p.old_epc)?;
                self.put(idx, new_words)?;
                self.put_slice(idx, &p.new_epc)?;
                self.put_slice(idx, &p.password)?;
            }
            Command::KillTag { epc, password } => {
                let epc_words = ((epc.len() + 1) / 2) as u8;
                self.put(idx, epc_words)?;
                self.put_slice(idx, epc)?;
                self.put_slice(idx, password)?;
            }
            Command::SetProtection { epc, select_flag, set_flag, password } => {
                let epc_words = ((epc.len() + 1) / 2) as u8;
                self.put(idx, epc_words)?;
                self.put_slice(idx, epc)?;
                self.put(idx, *select_flag)?;
                self.put(idx, *set_flag)?;
                self.put_slice(idx, password)?;
            }
            Command::BlockErase { epc, mem_bank, word_ptr, word_count, password } => {
                let epc_words = ((epc.len() + 1) / 2) as u8;
                self.put(idx, epc_words)?;
                self.put_slice(idx, epc)?;
                self.put(idx, *mem_bank)?;
                self.put(idx, *word_ptr)?;
                self.put(idx, *word_count)?;
                self.put_slice(idx, password)?;
            }
            Command::ModifyFrequency { max_fre, min_fre } => {
                self.put(idx, *max_fre)?;
                self.put(idx, *min_fre)?;
            }
            Command::ModifyReaderAddr(addr) => self.put(idx, *addr)?,
            Command::ModifyInventoryTime(t) => self.put(idx, *t)?,
            Command::ModifyBaudRate(i) => self.put(idx, *i)?,
            Command::ModifyRfPower(p) => self.put(idx, *p)?,
            Command::LedBuzzer { active_time, silent_time, times } => {
                self.put(idx, *active_time)?;
                self.put(idx, *silent_time)?;
                self.put(idx, *times)?;
            }
            Command::AntennaMux(cfg) => self.put(idx, *cfg)?,
            Command::Buzzer(on) => self.put(idx, *on as u8)?,
            Command::GpioControl(state) => self.put(idx, *state)?,
            Command::StartFastInventory { target } => self.put(idx, *target)?,
            Command::SetWorkMode(mode) => self.put(idx, *mode)?,
            Command::Select(p) => {
                let mask_bytes = (p.mask_len as usize + 7) / 8;
                if p.mask.len() < mask_bytes {
                    return Err(Error::InvalidParam("mask data shorter than mask length".into()));
                }
                self.put(idx, p.antenna)?;
                self.put(idx, p.target)?;
                self.put(idx, p.action)?;
                self.put(idx, p.mem_bank)?;
                self.put(idx, (p.pointer >> 8) as u8)?;
                self.put(idx, (p.pointer & 0xFF) as u8)?;
                self.put(idx, p.mask_len)?;
                self.put_slice(idx, &p.mask[..mask_bytes])?;
                self.put(idx, p.truncate)?;
            }
            // No-data commands
            Command::SingleTagInventory
            | Command::ObtainReaderInfo
            | Command::ObtainReaderSn
            | Command::ObtainGpioState
            | Command::StopFastInventory
            | Command::GetDataFromBuffer
            | Command::ClearMemoryBuffer
            | Command::GetTagCount
            | Command::MeasureTemperature
            | Command::StopImmediately => {}
        }
        Ok(())
    }
}

/// Validate a whole frame and extract its header fields.
pub fn parse_response_header(frame: &[u8]) -> Result<ResponseHeader, Error> {
    if frame.len() < MIN_RESPONSE_SIZE {
        return Err(Error::FrameTooShort);
    }
    verify_frame(frame)?;

    let header = ResponseHeader {
        len: frame[0],
        addr: frame[1],
        recmd: frame[2],
        status: frame[3],
    };

    // Len counts bytes after itself, never itself.
    if header.len as usize + 1 != frame.len() {
        return Err(Error::LengthMismatch);
    }
    Ok(header)
}

/// Data field of a validated response frame: everything between the status
/// byte and the CRC.
pub fn response_payload(frame: &[u8]) -> &[u8] {
    &frame[4..frame.len() - 2]
}

/// Decode one tag entry from a standard inventory payload block.
///
/// First byte: bit 7 = EPC and TID combined, bit 6 = phase/frequency
/// appended, bits 5..0 = data byte count. Returns the tag and the number
/// of payload bytes consumed so the caller can advance to the next entry.
pub fn parse_tag_data(data: &[u8]) -> Result<(TagData, usize), Error> {
    if data.len() < 2 {
        return Err(Error::MissingData);
    }

    let mut tag = TagData::default();
    let mut idx = 0usize;

    let len_byte = data[idx];
    idx += 1;
    let combined = len_byte & 0x80 != 0;
    let phase_freq = len_byte & 0x40 != 0;
    let data_bytes = (len_byte & 0x3F) as usize;

    if idx + data_bytes > data.len() {
        return Err(Error::MissingData);
    }

    if combined && data_bytes >= 2 {
        // PC word bits 15-11 give the EPC length in words; the EPC block is
        // PC(2) + EPC + CRC(2), and whatever follows it is TID.
        let pc_word = ((data[idx] as u16) << 8) | data[idx + 1] as u16;
        let epc_bytes = (((pc_word >> 11) & 0x1F) * 2) as usize;
        let epc_block = 2 + epc_bytes + 2;

        if epc_block <= data_bytes {
            let epc_len = epc_bytes.min(MAX_EPC_LENGTH);
            tag.epc = data[idx + 2..idx + 2 + epc_len].to_vec();

            let tid_len = data_bytes - epc_block;
            if tid_len > 0 {
                let tid_len = tid_len.min(MAX_TID_LENGTH);
                tag.tid = Some(data[idx + epc_block..idx + epc_block + tid_len].to_vec());
            }
        } else {
            // PC word claims more than the block holds; keep all bytes as EPC.
            let epc_len = data_bytes.min(MAX_EPC_LENGTH);
            tag.epc = data[idx..idx + epc_len].to_vec();
        }
    } else {
        let epc_len = data_bytes.min(MAX_EPC_LENGTH);
        tag.epc = data[idx..idx + epc_len].to_vec();
    }
    idx += data_bytes;

    if idx >= data.len() {
        return Err(Error::MissingData);
    }
    tag.rssi = data[idx];
    idx += 1;

    if phase_freq {
        if idx + 4 > data.len() {
            return Err(Error::MissingData);
        }
        tag.phase = Some(u32::from_le_bytes([
            data[idx],
            data[idx + 1],
            data[idx + 2],
            data[idx + 3],
        ]));
        idx += 4;

        if idx + 3 <= data.len() {
            tag.frequency_khz = Some(
                data[idx] as u32 | (data[idx + 1] as u32) << 8 | (data[idx + 2] as u32) << 16,
            );
            idx += 3;
        }
    }

    Ok((tag, idx))
}

/// Decode an auto-upload (reCmd 0xEE) payload: `Ant | Len | EPC[Len] | RSSI`.
pub fn parse_auto_upload_tag(data: &[u8]) -> Result<TagData, Error> {
    if data.len() < 3 {
        return Err(Error::MissingData);
    }

    let mut tag = TagData {
        antenna: data[0],
        ..Default::default()
    };
    let epc_len = data[1] as usize;

    if 2 + epc_len + 1 > data.len() {
        return Err(Error::MissingData);
    }

    let copy_len = epc_len.min(MAX_EPC_LENGTH);
    tag.epc = data[2..2 + copy_len].to_vec();
    tag.rssi = data[2 + epc_len];

    Ok(tag)
}

/// Decode Obtain Reader Info (0x21) payload:
/// `Version(2) | Type | Tr_Type | MaxFre | MinFre | Power | Scntm | Ant | Reserved(2) | CheckAnt`.
pub fn parse_reader_info(data: &[u8]) -> Result<ReaderInfo, Error> {
    if data.len() < 12 {
        return Err(Error::MissingData);
    }
    Ok(ReaderInfo {
        firmware_version: data[0] as u16 | (data[1] as u16) << 8,
        model_type: data[2],
        protocol_type: data[3],
        max_freq: data[4],
        min_freq: data[5],
        power: data[6],
        scan_time: data[7],
        antenna: data[8],
        check_antenna: data[11],
    })
}

/// Decode a statistics payload: `Ant | ReadRate(2 LE) | TotalCount(4 LE)`.
pub fn parse_inventory_stats(data: &[u8]) -> Result<InventoryStats, Error> {
    if data.len() < 7 {
        return Err(Error::MissingData);
    }
    Ok(InventoryStats {
        antenna: data[0],
        read_rate: data[1] as u16 | (data[2] as u16) << 8,
        total_count: u32::from_le_bytes([data[3], data[4], data[5], data[6]]),
    })
}

/// Decode a buffered-tag count payload (2 bytes, big-endian).
pub fn parse_tag_count(data: &[u8]) -> Result<u16, Error> {
    if data.len() < 2 {
        return Err(Error::MissingData);
    }
    Ok(((data[0] as u16) << 8) | data[1] as u16)
}

/// Decode a temperature payload: `PlusMinus | Magnitude`, where a zero sign
/// byte means below zero Celsius.
pub fn parse_temperature(data: &[u8]) -> Result<i16, Error> {
    if data.len() < 2 {
        return Err(Error::MissingData);
    }
    let magnitude = data[1] as i16;
    Ok(if data[0] == 0 { -magnitude } else { magnitude })
}

/// Decode a Read Data response payload: raw word-aligned memory bytes.
pub fn parse_read_response(data: &[u8]) -> Result<Vec<u8>, Error> {
    if data.is_empty() {
        return Err(Error::MissingData);
    }
    Ok(data.to_vec())
}

/// Assemble a response frame with a valid length field and CRC. Test helper
/// for every layer that consumes reader responses.
#[cfg(test)]
pub(crate) fn make_response(addr: u8, recmd: u8, status: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![(payload.len() + 5) as u8, addr, recmd, status];
    frame.extend_from_slice(payload);
    let crc = crc16_wire(&frame);
    frame.push((crc & 0xFF) as u8);
    frame.push((crc >> 8) as u8);
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InventoryParams, ReadParams};

    fn crc_le(body: &[u8]) -> [u8; 2] {
        let crc = crc16_wire(body);
        [(crc & 0xFF) as u8, (crc >> 8) as u8]
    }

    #[test]
    fn test_build_start_fast_inventory() {
        let mut codec = Codec::new(0x00);
        let frame = codec
            .build(&Command::StartFastInventory { target: 0x00 })
            .unwrap()
            .to_vec();
        assert_eq!(frame.len(), 6);
        assert_eq!(&frame[..4], &[0x05, 0x00, 0x50, 0x00]);
        assert_eq!(&frame[4..], &crc_le(&frame[..4]));
    }

    #[test]
    fn test_build_stop_fast_inventory() {
        let mut codec = Codec::new(0x00);
        let frame = codec.build(&Command::StopFastInventory).unwrap().to_vec();
        assert_eq!(frame.len(), 5);
        assert_eq!(&frame[..3], &[0x04, 0x00, 0x51]);
        assert_eq!(&frame[3..], &crc_le(&frame[..3]));
    }

    #[test]
    fn test_build_default_inventory_matches_vendor_capture() {
        let mut codec = Codec::new(0x00);
        let frame = codec.build(&Command::TagInventoryDefault).unwrap().to_vec();
        assert_eq!(&frame[..8], &[0x09, 0x00, 0x01, 0x04, 0xFE, 0x00, 0x80, 0x32]);
        assert_eq!(&frame[8..], &crc_le(&frame[..8]));
    }

    #[test]
    fn test_build_uses_reader_addr() {
        let mut codec = Codec::new(0x42);
        let frame = codec.build(&Command::ObtainReaderInfo).unwrap();
        assert_eq!(frame[1], 0x42);
    }

    #[test]
    fn test_built_frames_verify_and_match_len() {
        let commands = [
            Command::ObtainReaderInfo,
            Command::StopImmediately,
            Command::SetWorkMode(0x00),
            Command::ModifyRfPower(20),
            Command::TagInventoryDefault,
            Command::LedBuzzer { active_time: 2, silent_time: 2, times: 3 },
        ];
        let mut codec = Codec::new(0x00);
        for command in &commands {
            let frame = codec.build(command).unwrap().to_vec();
            assert!(verify_frame(&frame).is_ok());
            assert_eq!(frame[0] as usize + 1, frame.len());
        }
    }

    #[test]
    fn test_build_read_data_epc_mode() {
        let mut codec = Codec::new(0x00);
        let command = Command::read_data(ReadParams {
            epc: vec![0xE2, 0x00, 0x11, 0x22],
            mem_bank: 0x03,
            word_ptr: 0x02,
            word_count: 2,
            password: [0, 0, 0, 0],
            ..Default::default()
        })
        .unwrap();
        let frame = codec.build(&command).unwrap();
        // ENum = (4+1)/2 = 2 words
        assert_eq!(frame[3], 0x02);
        assert_eq!(&frame[4..8], &[0xE2, 0x00, 0x11, 0x22]);
        assert_eq!(frame[8], 0x03);
        assert_eq!(frame[9], 0x02);
        assert_eq!(frame[10], 0x02);
        // Len = 4 + 12 data bytes
        assert_eq!(frame[0], 0x10);
    }

    #[test]
    fn test_build_read_data_mask_mode_marker() {
        let mut codec = Codec::new(0x00);
        let command = Command::read_data(ReadParams {
            epc: Vec::new(),
            mem_bank: 0x01,
            word_ptr: 0,
            word_count: 4,
            mask_mem: 0x01,
            mask_addr: 0x0020,
            mask_len: 16,
            mask_data: vec![0xAA, 0xBB],
            ..Default::default()
        })
        .unwrap();
        let frame = codec.build(&command).unwrap();
        assert_eq!(frame[3], 0xFF);
        // data = 1+1+1+1+4+1+2+1+2 = 14 bytes
        assert_eq!(frame[0], 4 + 14);
    }

    #[test]
    fn test_build_inventory_optional_fields() {
        let mut codec = Codec::new(0x00);

        let bare = InventoryParams { antenna: 0, scan_time: 0, ..Default::default() };
        let frame = codec.build(&Command::TagInventory(bare)).unwrap().to_vec();
        // q, session, mask_mem, addr(2), mask_len, tid_addr, tid_len, target
        assert_eq!(frame[0] as usize, 4 + 9);

        let full = InventoryParams { antenna: 0x80, scan_time: 0x32, ..Default::default() };
        let frame = codec.build(&Command::TagInventory(full)).unwrap().to_vec();
        assert_eq!(frame[0] as usize, 4 + 11);
    }

    #[test]
    fn test_build_overflow_rejected() {
        let mut codec = Codec::new(0x00);
        let command = Command::WriteEpc(crate::types::WriteEpcParams {
            old_epc: vec![0xAA; 130],
            new_epc: vec![0xBB; 130],
            password: [0; 4],
        });
        assert!(matches!(codec.build(&command), Err(Error::BufferOverflow)));
    }

    #[test]
    fn test_parse_response_header_roundtrip() {
        let frame = make_response(0x00, 0x21, 0x00, &[0x11; 12]);
        let header = parse_response_header(&frame).unwrap();
        assert_eq!(header.len as usize + 1, frame.len());
        assert_eq!(header.recmd, 0x21);
        assert_eq!(header.status, 0x00);
        assert_eq!(response_payload(&frame).len(), 12);
    }

    #[test]
    fn test_parse_response_header_errors() {
        assert!(matches!(
            parse_response_header(&[0x04, 0x00, 0x21, 0x00]),
            Err(Error::FrameTooShort)
        ));

        let mut frame = make_response(0x00, 0x21, 0x00, &[]);
        frame[4] ^= 0xFF;
        assert!(matches!(parse_response_header(&frame), Err(Error::CrcFailed)));

        // Valid CRC over a lying length field
        let mut frame = vec![0x09, 0x00, 0x21, 0x00];
        let crc = crc_le(&frame);
        frame.extend_from_slice(&crc);
        assert!(matches!(parse_response_header(&frame), Err(Error::LengthMismatch)));
    }

    #[test]
    fn test_parse_min_and_max_length_frames() {
        // Len = 4: smallest frame the boundary admits, nothing after the
        // command byte but the CRC
        let mut frame = vec![0x04, 0x00, 0x93];
        let crc = crc_le(&frame);
        frame.extend_from_slice(&crc);
        assert_eq!(frame.len(), MIN_RESPONSE_SIZE);
        assert!(parse_response_header(&frame).is_ok());

        // Smallest shape carrying a status byte is 6 bytes
        let frame = make_response(0x00, 0x93, 0x00, &[]);
        assert_eq!(frame.len(), MIN_RESPONSE_SIZE + 1);
        let header = parse_response_header(&frame).unwrap();
        assert_eq!(header.status, 0x00);
        assert!(response_payload(&frame).is_empty());

        // Len = 255: largest
        let frame = make_response(0x00, 0x01, 0x03, &[0x5A; 250]);
        assert_eq!(frame.len(), MAX_FRAME_SIZE);
        assert!(parse_response_header(&frame).is_ok());
    }

    #[test]
    fn test_parse_tag_data_plain_epc() {
        let mut payload = vec![0x0C];
        payload.extend_from_slice(&[0xE2; 12]);
        payload.push(0x45); // RSSI
        let (tag, consumed) = parse_tag_data(&payload).unwrap();
        assert_eq!(tag.epc, vec![0xE2; 12]);
        assert_eq!(tag.tid, None);
        assert_eq!(tag.rssi, 0x45);
        assert_eq!(consumed, 14);
    }

    #[test]
    fn test_parse_tag_data_combined_epc_tid() {
        // PC word 0x3000: 6 words = 12 EPC bytes; block = 2+12+2; 12 TID bytes
        let mut payload = vec![0x80 | 28, 0x30, 0x00];
        payload.extend_from_slice(&[0xE2; 12]); // EPC
        payload.extend_from_slice(&[0xCC, 0xDD]); // EPC CRC
        payload.extend_from_slice(&[0xAB; 12]); // TID
        payload.push(0x50); // RSSI
        let (tag, consumed) = parse_tag_data(&payload).unwrap();
        assert_eq!(tag.epc, vec![0xE2; 12]);
        assert_eq!(tag.tid, Some(vec![0xAB; 12]));
        assert_eq!(tag.rssi, 0x50);
        assert_eq!(consumed, 30);
    }

    #[test]
    fn test_parse_tag_data_phase_and_frequency() {
        let mut payload = vec![0x40 | 0x04];
        payload.extend_from_slice(&[0x11, 0x22, 0x33, 0x44]); // EPC
        payload.push(0x60); // RSSI
        payload.extend_from_slice(&[0x01, 0x00, 0x00, 0x00]); // phase LE
        payload.extend_from_slice(&[0x48, 0x0E, 0x0E]); // 922184 kHz LE
        let (tag, consumed) = parse_tag_data(&payload).unwrap();
        assert_eq!(tag.phase, Some(1));
        assert_eq!(tag.frequency_khz, Some(0x0E0E48));
        assert_eq!(consumed, payload.len());
    }

    #[test]
    fn test_parse_tag_data_truncates_oversized_epc() {
        // 63 claimed bytes do not fit the 6-bit field; use max 0x3F = 63
        let mut payload = vec![0x3F];
        payload.extend_from_slice(&[0x77; 63]);
        payload.push(0x10);
        let (tag, _) = parse_tag_data(&payload).unwrap();
        assert_eq!(tag.epc.len(), MAX_EPC_LENGTH);
    }

    #[test]
    fn test_parse_tag_data_missing_rssi() {
        let payload = vec![0x02, 0xAA, 0xBB];
        assert!(matches!(parse_tag_data(&payload), Err(Error::MissingData)));
    }

    #[test]
    fn test_parse_auto_upload_tag() {
        let mut payload = vec![0x80, 0x0C];
        payload.extend_from_slice(&[0xE2, 0x00, 0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0, 0x11, 0x22]);
        payload.push(0x45);
        let tag = parse_auto_upload_tag(&payload).unwrap();
        assert_eq!(tag.antenna, 0x80);
        assert_eq!(tag.epc.len(), 12);
        assert_eq!(tag.rssi, 0x45);
    }

    #[test]
    fn test_parse_auto_upload_short() {
        assert!(matches!(parse_auto_upload_tag(&[0x80, 0x0C, 0xE2]), Err(Error::MissingData)));
    }

    #[test]
    fn test_parse_reader_info() {
        let payload = [0x34, 0x12, 0x01, 0x02, 0x3E, 0x00, 0x1E, 0x32, 0x01, 0x00, 0x00, 0x01];
        let info = parse_reader_info(&payload).unwrap();
        assert_eq!(info.firmware_version, 0x1234);
        assert_eq!(info.max_freq, 0x3E);
        assert_eq!(info.power, 30);
        assert_eq!(info.check_antenna, 1);
    }

    #[test]
    fn test_parse_inventory_stats() {
        let payload = [0x01, 0x10, 0x00, 0xE8, 0x03, 0x00, 0x00];
        let stats = parse_inventory_stats(&payload).unwrap();
        assert_eq!(stats.read_rate, 16);
        assert_eq!(stats.total_count, 1000);
    }

    #[test]
    fn test_parse_tag_count_big_endian() {
        assert_eq!(parse_tag_count(&[0x01, 0x02]).unwrap(), 0x0102);
    }

    #[test]
    fn test_parse_temperature_sign() {
        assert_eq!(parse_temperature(&[0x01, 35]).unwrap(), 35);
        assert_eq!(parse_temperature(&[0x00, 12]).unwrap(), -12);
        assert!(matches!(parse_temperature(&[0x01]), Err(Error::MissingData)));
    }
}
