//! In-memory WAV writer for test fixtures (PCM → WAV)

/// One RIFF sub-chunk: id, LE size, payload, pad byte when odd.
pub fn chunk(id: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + payload.len() + 1);
    out.extend_from_slice(id);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        out.push(0);
    }
    out
}

/// Canonical 44-byte-header mono 16-bit PCM file.
pub fn pcm_to_wav(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    let data: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    WavWriter::new(sample_rate).data(&data).build()
}

/// Builder for odd-shaped files: extended `fmt `, extra chunks, wrong formats.
pub struct WavWriter {
    sample_rate: u32,
    format_tag: u16,
    channels: u16,
    bits: u16,
    fmt_extra: Vec<u8>,
    body: Vec<u8>,
}

impl WavWriter {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            format_tag: 1,
            channels: 1,
            bits: 16,
            fmt_extra: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn format_tag(mut self, tag: u16) -> Self {
        self.format_tag = tag;
        self
    }

    pub fn channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    pub fn bits(mut self, bits: u16) -> Self {
        self.bits = bits;
        self
    }

    /// Bytes appended after the 16 standard `fmt ` fields.
    pub fn fmt_extra(mut self, extra: &[u8]) -> Self {
        self.fmt_extra = extra.to_vec();
        self
    }

    /// Extra chunk written between `fmt ` and `data`.
    pub fn chunk(mut self, id: &[u8; 4], payload: &[u8]) -> Self {
        self.body.extend(chunk(id, payload));
        self
    }

    pub fn data(mut self, bytes: &[u8]) -> Self {
        self.body.extend(chunk(b"data", bytes));
        self
    }

    /// `data` chunk whose header claims `declared` bytes but carries `bytes`.
    pub fn data_declared(mut self, declared: u32, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(b"data");
        self.body.extend_from_slice(&declared.to_le_bytes());
        self.body.extend_from_slice(bytes);
        self
    }

    pub fn fmt_chunk(&self) -> Vec<u8> {
        let block_align = self.channels * (self.bits / 8);
        let byte_rate = self.sample_rate * u32::from(block_align);

        let mut fmt = Vec::with_capacity(16 + self.fmt_extra.len());
        fmt.extend_from_slice(&self.format_tag.to_le_bytes());
        fmt.extend_from_slice(&self.channels.to_le_bytes());
        fmt.extend_from_slice(&self.sample_rate.to_le_bytes());
        fmt.extend_from_slice(&byte_rate.to_le_bytes());
        fmt.extend_from_slice(&block_align.to_le_bytes());
        fmt.extend_from_slice(&self.bits.to_le_bytes());
        fmt.extend_from_slice(&self.fmt_extra);
        chunk(b"fmt ", &fmt)
    }

    pub fn build(self) -> Vec<u8> {
        let fmt = self.fmt_chunk();
        let riff_len = (4 + fmt.len() + self.body.len()) as u32;

        let mut wav = Vec::with_capacity(12 + fmt.len() + self.body.len());
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&riff_len.to_le_bytes());
        wav.extend_from_slice(b"WAVE");
        wav.extend(fmt);
        wav.extend(self.body);
        wav
    }
}
