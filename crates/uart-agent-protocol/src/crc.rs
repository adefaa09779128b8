//! CRC32 校验
//!
//! 反射 CRC-32（多项式 0xEDB88320，IEEE/zlib 变体），256 项查找表。
//! 查找表在首次使用时生成并缓存到进程结束，并发生成是幂等的。

use std::sync::OnceLock;

/// 反射多项式
const REVERSED_POLYNOMIAL: u32 = 0xEDB8_8320;

static TABLE: OnceLock<[u32; 256]> = OnceLock::new();

fn generate_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    for (n, entry) in table.iter_mut().enumerate() {
        let mut checksum = n as u32;
        for _ in 0..8 {
            checksum = if checksum & 1 != 0 {
                (checksum >> 1) ^ REVERSED_POLYNOMIAL
            } else {
                checksum >> 1
            };
        }
        *entry = checksum;
    }
    table
}

#[inline]
fn table() -> &'static [u32; 256] {
    TABLE.get_or_init(generate_table)
}

/// 计算字节序列的 CRC32
///
/// # Example
///
/// ```
/// use uart_agent_protocol::crc32;
///
/// assert_eq!(crc32(b"123456789"), 0xCBF43926);
/// ```
#[inline]
#[must_use]
pub fn crc32(data: &[u8]) -> u32 {
    let mut digest = Crc32Digest::new();
    digest.update(data);
    digest.finalize()
}

/// CRC32 增量计算
///
/// 适用于逐段写入帧的场景（例如负载和填充分别写入）。
#[derive(Debug, Clone)]
pub struct Crc32Digest {
    state: u32,
}

impl Crc32Digest {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self { state: !0 }
    }

    /// 追加字节
    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        let table = table();
        self.state = data.iter().fold(self.state, |checksum, &byte| {
            table[((checksum ^ byte as u32) & 0xFF) as usize] ^ (checksum >> 8)
        });
    }

    /// 结束计算并返回校验值
    #[inline]
    #[must_use]
    pub fn finalize(self) -> u32 {
        !self.state
    }
}

impl Default for Crc32Digest {
    fn default() -> Self {
        Self::new()
    }
}
