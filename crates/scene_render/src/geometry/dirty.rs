//! Per-channel dirty tracking for GPU buffer uploads
//!
//! [`DirtyFlags::mark_dirty`] is the only way in, a successful
//! [`DirtyFlags::upload_with`] is the only way out. A dirty channel the bound
//! material does not consume is parked as [`ChannelState::Deferred`]: it no
//! longer counts as dirty, and [`DirtyFlags::resume`] brings it back once a
//! material needs it.

use bitflags::bitflags;

/// Uploadable data channel of a buffer group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Positions
    Vertices,
    /// Normals
    Normals,
    /// Colors
    Colors,
    /// First UV set
    Uvs,
    /// Second UV set
    Uv2,
    /// Triangle and line indices
    Elements,
}

impl Channel {
    /// Every channel in upload order
    pub const ALL: [Self; 6] = [
        Self::Vertices,
        Self::Normals,
        Self::Colors,
        Self::Uvs,
        Self::Uv2,
        Self::Elements,
    ];

    const fn index(self) -> usize {
        match self {
            Self::Vertices => 0,
            Self::Normals => 1,
            Self::Colors => 2,
            Self::Uvs => 3,
            Self::Uv2 => 4,
            Self::Elements => 5,
        }
    }
}

bitflags! {
    /// Set of channels, used to mark several channels dirty at once
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ChannelSet: u8 {
        /// Positions
        const VERTICES = 1 << 0;
        /// Normals
        const NORMALS = 1 << 1;
        /// Colors
        const COLORS = 1 << 2;
        /// First UV set
        const UVS = 1 << 3;
        /// Second UV set
        const UV2 = 1 << 4;
        /// Triangle and line indices
        const ELEMENTS = 1 << 5;
    }
}

impl ChannelSet {
    /// Channels contained in this set
    pub fn channels(self) -> impl Iterator<Item = Channel> {
        Channel::ALL.into_iter().filter(move |channel| self.contains(Self::from(*channel)))
    }
}

impl From<Channel> for ChannelSet {
    fn from(channel: Channel) -> Self {
        match channel {
            Channel::Vertices => Self::VERTICES,
            Channel::Normals => Self::NORMALS,
            Channel::Colors => Self::COLORS,
            Channel::Uvs => Self::UVS,
            Channel::Uv2 => Self::UV2,
            Channel::Elements => Self::ELEMENTS,
        }
    }
}

/// State of one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    /// GPU copy matches CPU data
    Clean,
    /// CPU data changed since the last upload
    #[default]
    Dirty,
    /// Changed, but not consumed by the current material
    Deferred,
}

/// Dirty state of all channels of one buffer group
///
/// New groups start with every channel dirty so the first update uploads
/// everything the material needs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DirtyFlags {
    states: [ChannelState; 6],
}

impl DirtyFlags {
    /// All channels dirty
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark one channel as needing upload
    pub fn mark_dirty(&mut self, channel: Channel) {
        self.states[channel.index()] = ChannelState::Dirty;
    }

    /// Mark every channel in `channels` as needing upload
    pub fn mark_all(&mut self, channels: ChannelSet) {
        for channel in channels.channels() {
            self.mark_dirty(channel);
        }
    }

    /// Park a dirty channel no material currently consumes
    pub fn defer(&mut self, channel: Channel) {
        if self.is_dirty(channel) {
            self.states[channel.index()] = ChannelState::Deferred;
        }
    }

    /// Make a deferred channel dirty again
    pub fn resume(&mut self, channel: Channel) {
        if self.state(channel) == ChannelState::Deferred {
            self.states[channel.index()] = ChannelState::Dirty;
        }
    }

    /// State of one channel
    pub fn state(&self, channel: Channel) -> ChannelState {
        self.states[channel.index()]
    }

    /// Whether a channel needs upload
    pub fn is_dirty(&self, channel: Channel) -> bool {
        self.state(channel) == ChannelState::Dirty
    }

    /// Whether any channel needs upload
    pub fn any_dirty(&self) -> bool {
        self.states.iter().any(|state| *state == ChannelState::Dirty)
    }

    /// Run `upload` for a dirty channel and clear the flag if it succeeds
    ///
    /// Returns `Ok(false)` without calling `upload` when the channel is clean.
    /// A failed upload leaves the channel dirty.
    pub fn upload_with<E>(
        &mut self,
        channel: Channel,
        upload: impl FnOnce() -> Result<(), E>,
    ) -> Result<bool, E> {
        if !self.is_dirty(channel) {
            return Ok(false);
        }
        upload()?;
        self.states[channel.index()] = ChannelState::Clean;
        Ok(true)
    }
}
