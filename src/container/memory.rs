//! In-memory container. Acts as a source and as a sink; segments written to
//! it are appended to the named channel so the result can be read back.

use crate::container::{
    ChannelKey, ChannelSource, ContainerError, SampleBuffer, Samples, SegmentSink,
    check_bounds,
};

#[derive(Debug, Default, Clone)]
pub struct MemoryContainer {
    groups: Vec<(String, Vec<(String, SampleBuffer)>)>,
    segment_lens: Vec<(ChannelKey, u64)>,
}

impl MemoryContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, group: &str, channel: &str, samples: SampleBuffer) -> Self {
        self.insert(group, channel, samples);
        self
    }

    /// Adds a channel, replacing any existing channel of the same name.
    pub fn insert(&mut self, group: &str, channel: &str, samples: SampleBuffer) {
        let channels = self.group_mut(group);
        match channels.iter_mut().find(|(name, _)| name == channel) {
            Some((_, existing)) => *existing = samples,
            None => channels.push((channel.to_string(), samples)),
        }
    }

    pub fn channel(&self, key: &ChannelKey) -> Option<&SampleBuffer> {
        self.groups
            .iter()
            .find(|(name, _)| *name == key.group)
            .and_then(|(_, channels)| channels.iter().find(|(name, _)| *name == key.channel))
            .map(|(_, samples)| samples)
    }

    /// Sample counts of every segment written through [`SegmentSink`], in order.
    pub fn segment_lens(&self) -> &[(ChannelKey, u64)] {
        &self.segment_lens
    }

    fn group_mut(&mut self, group: &str) -> &mut Vec<(String, SampleBuffer)> {
        let idx = match self.groups.iter().position(|(name, _)| name == group) {
            Some(idx) => idx,
            None => {
                self.groups.push((group.to_string(), Vec::new()));
                self.groups.len() - 1
            }
        };
        &mut self.groups[idx].1
    }

    fn lookup(&self, key: &ChannelKey) -> Result<&SampleBuffer, ContainerError> {
        self.channel(key)
            .ok_or_else(|| ContainerError::UnknownChannel(key.clone()))
    }
}

impl ChannelSource for MemoryContainer {
    fn group_names(&self) -> Vec<String> {
        self.groups.iter().map(|(name, _)| name.clone()).collect()
    }

    fn channel_names(&self, group: &str) -> Vec<String> {
        self.groups
            .iter()
            .find(|(name, _)| name == group)
            .map(|(_, channels)| channels.iter().map(|(name, _)| name.clone()).collect())
            .unwrap_or_default()
    }

    fn channel_len(&self, key: &ChannelKey) -> Result<u64, ContainerError> {
        Ok(self.lookup(key)?.len())
    }

    fn read(&self, key: &ChannelKey, offset: u64, length: u64) -> Result<SampleBuffer, ContainerError> {
        let samples = self.lookup(key)?;
        check_bounds(key, offset, length, samples.len())?;
        let bytes = samples
            .sample_bytes(offset, length)
            .ok_or_else(|| ContainerError::Format(format!("channel {key} is not addressable")))?;
        SampleBuffer::from_bytes(samples.dtype(), bytes.to_vec())
    }
}

impl SegmentSink for MemoryContainer {
    fn write_segment(&mut self, key: &ChannelKey, samples: Samples<'_>) -> Result<(), ContainerError> {
        let channels = self.group_mut(&key.group);
        match channels.iter_mut().find(|(name, _)| *name == key.channel) {
            Some((_, existing)) => {
                if existing.dtype() != samples.dtype() {
                    return Err(ContainerError::TypeMismatch {
                        channel: key.clone(),
                        expected: existing.dtype(),
                        found: samples.dtype(),
                    });
                }
                existing.append(samples)?;
            }
            None => channels.push((key.channel.clone(), samples.to_buffer())),
        }
        self.segment_lens.push((key.clone(), samples.len()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_inside_bounds_only() {
        let mem = MemoryContainer::new().with_channel("g", "a", SampleBuffer::from_i32(&[1, 2, 3]));
        let key = ChannelKey::new("g", "a");
        let buf = mem.read(&key, 1, 2).expect("read");
        assert_eq!(buf.to_i32_vec(), Some(vec![2, 3]));
        assert!(matches!(
            mem.read(&key, 2, 2),
            Err(ContainerError::RangeOverrun { .. })
        ));
        assert!(matches!(
            mem.read(&ChannelKey::new("g", "b"), 0, 1),
            Err(ContainerError::UnknownChannel(_))
        ));
    }

    #[test]
    fn segments_append_to_channels() {
        let mut mem = MemoryContainer::new();
        let key = ChannelKey::new("g", "a");
        mem.write_segment(&key, SampleBuffer::from_i32(&[1, 2]).as_samples()).expect("seg");
        mem.write_segment(&key, SampleBuffer::from_i32(&[3]).as_samples()).expect("seg");
        assert_eq!(mem.channel(&key).and_then(|b| b.to_i32_vec()), Some(vec![1, 2, 3]));
        assert_eq!(mem.segment_lens().len(), 2);
        assert!(mem.write_segment(&key, SampleBuffer::from_f64(&[1.0]).as_samples()).is_err());
    }
}
