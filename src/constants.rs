use core::time::Duration;

// FRAME_DELIMITER marks both the start and the end of every SHDLC frame.
pub const FRAME_DELIMITER: u8 = 0x7E;

// ESCAPE introduces a stuffed byte; the following byte is looked up in ESCAPE_TABLE.
pub const ESCAPE: u8 = 0x7D;

// ESCAPE_TABLE pairs every reserved byte with the byte sent after ESCAPE in its place.
pub const ESCAPE_TABLE: [(u8, u8); 4] = [(0x7E, 0x5E), (0x7D, 0x5D), (0x11, 0x31), (0x13, 0x33)];

// MAX_DATA_LEN is the largest payload the one-byte length field can describe.
pub const MAX_DATA_LEN: usize = 255;

// MAX_BODY_LEN is the largest unstuffed body: ADR CMD STATE L, data and checksum.
pub const MAX_BODY_LEN: usize = 4 + MAX_DATA_LEN + 1;

// MAX_WIRE_LEN is the largest frame on the wire, every body byte stuffed plus two delimiters.
pub const MAX_WIRE_LEN: usize = 2 * MAX_BODY_LEN + 2;

// MAX_PARAMS_LEN is the longest request data of any supported command.
pub const MAX_PARAMS_LEN: usize = 5;

// RX_BUFFER_LEN bounds the bytes accumulated while waiting for one response.
pub const RX_BUFFER_LEN: usize = MAX_WIRE_LEN;

// Opcodes understood by the sensor.
pub const CMD_START_MEASUREMENT: u8 = 0x00;
pub const CMD_STOP_MEASUREMENT: u8 = 0x01;
pub const CMD_READ_MEASUREMENT: u8 = 0x03;
pub const CMD_AUTO_CLEANING_INTERVAL: u8 = 0x80;
pub const CMD_START_FAN_CLEANING: u8 = 0x56;
pub const CMD_DEVICE_INFORMATION: u8 = 0xD0;
pub const CMD_RESET: u8 = 0xD3;

// SUBCMD_START_MEASUREMENT is the first data byte of a start measurement request.
pub const SUBCMD_START_MEASUREMENT: u8 = 0x01;

// SUBCMD_AUTO_CLEANING_INTERVAL is the first data byte of an auto-cleaning interval request.
pub const SUBCMD_AUTO_CLEANING_INTERVAL: u8 = 0x00;

// Output formats selectable with the start measurement command.
pub const FORMAT_FLOAT: u8 = 0x03;
pub const FORMAT_UINT16: u8 = 0x05;

// Device information selectors.
pub const INFO_PRODUCT_TYPE: u8 = 0x00;
pub const INFO_SERIAL_NUMBER: u8 = 0x03;

// DEVICE_INFO_LEN is the longest string returned by a device information request.
pub const DEVICE_INFO_LEN: usize = 32;

// STATE_ERROR_MASK selects the error code from a response state byte.
pub const STATE_ERROR_MASK: u8 = 0x7F;

// STATE_STATUS_FLAG is set in the state byte when the device status register has flags raised.
pub const STATE_STATUS_FLAG: u8 = 0x80;

// Default connection and timing parameters.
pub const DEFAULT_ADDRESS: u8 = 0x00;
pub const DEFAULT_BAUD_RATE: u32 = 115_200;
pub const DEFAULT_SERIAL_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_RETRIES: u8 = 3;
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_RESPONSE_DELAY: Duration = Duration::from_millis(20);
