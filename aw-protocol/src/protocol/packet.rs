use std::io::{Read, Write};

use super::{ByteArray, Direction, Error, Serializable, VarInt};

macro_rules! packets {
    (
        $(
            $dir:ident $id:literal $name:ident {
                $($field:ident : $ty:ty),* $(,)?
            }
        )*
    ) => {
        $(
            #[derive(Debug, Clone, PartialEq)]
            pub struct $name {
                $(pub $field: $ty,)*
            }

            impl $name {
                pub const ID: i32 = $id;
                pub const DIRECTION: Direction = Direction::$dir;
            }

            impl Serializable for $name {
                #[allow(unused_variables)]
                fn read_from<R: Read>(buf: &mut R) -> Result<Self, Error> {
                    Ok($name {
                        $($field: Serializable::read_from(buf)?,)*
                    })
                }

                #[allow(unused_variables)]
                fn write_to<W: Write>(&self, buf: &mut W) -> Result<(), Error> {
                    $(self.$field.write_to(buf)?;)*
                    Ok(())
                }
            }

            impl From<$name> for Packet {
                fn from(packet: $name) -> Packet {
                    Packet::$name(packet)
                }
            }
        )*

        #[derive(Debug, Clone, PartialEq)]
        pub enum Packet {
            $($name($name),)*
        }

        impl Packet {
            pub fn id(&self) -> i32 {
                match self {
                    $(Packet::$name(_) => $id,)*
                }
            }

            pub fn direction(&self) -> Direction {
                match self {
                    $(Packet::$name(_) => Direction::$dir,)*
                }
            }

            pub fn name(&self) -> &'static str {
                match self {
                    $(Packet::$name(_) => stringify!($name),)*
                }
            }

            pub fn write_payload<W: Write>(&self, buf: &mut W) -> Result<(), Error> {
                match self {
                    $(Packet::$name(packet) => packet.write_to(buf),)*
                }
            }

            pub fn read_payload<R: Read>(
                direction: Direction,
                id: i32,
                buf: &mut R,
            ) -> Result<Packet, Error> {
                $(
                    if direction == Direction::$dir && id == $id {
                        return Ok(Packet::$name($name::read_from(buf)?));
                    }
                )*
                Err(Error::UnknownPacket { direction, id })
            }
        }
    };
}

/// Which replica slot a grid sync targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncScope {
    /// Broadcast; the barrier that collides for everyone.
    Active,
    /// Unicast; the barrier one editor is working on.
    Focus,
}

impl Serializable for SyncScope {
    fn read_from<R: Read>(buf: &mut R) -> Result<SyncScope, Error> {
        match u8::read_from(buf)? {
            0 => Ok(SyncScope::Active),
            1 => Ok(SyncScope::Focus),
            other => Err(Error::InvalidValue {
                field: "sync scope",
                value: i32::from(other),
            }),
        }
    }

    fn write_to<W: Write>(&self, buf: &mut W) -> Result<(), Error> {
        let raw: u8 = match self {
            SyncScope::Active => 0,
            SyncScope::Focus => 1,
        };
        raw.write_to(buf)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolAction {
    Place,
    Break,
}

impl Serializable for ToolAction {
    fn read_from<R: Read>(buf: &mut R) -> Result<ToolAction, Error> {
        match u8::read_from(buf)? {
            0 => Ok(ToolAction::Place),
            1 => Ok(ToolAction::Break),
            other => Err(Error::InvalidValue {
                field: "tool action",
                value: i32::from(other),
            }),
        }
    }

    fn write_to<W: Write>(&self, buf: &mut W) -> Result<(), Error> {
        let raw: u8 = match self {
            ToolAction::Place => 0,
            ToolAction::Break => 1,
        };
        raw.write_to(buf)
    }
}

/// Per-axis "relative to current position" bits of a teleport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RelativeFlags(pub u8);

impl RelativeFlags {
    pub const X: u8 = 0x01;
    pub const Y: u8 = 0x02;
    pub const Z: u8 = 0x04;

    pub fn absolute() -> RelativeFlags {
        RelativeFlags(0)
    }

    pub fn contains(self, bit: u8) -> bool {
        self.0 & bit != 0
    }
}

impl Serializable for RelativeFlags {
    fn read_from<R: Read>(buf: &mut R) -> Result<RelativeFlags, Error> {
        let raw = u8::read_from(buf)?;
        if raw & !(Self::X | Self::Y | Self::Z) != 0 {
            return Err(Error::InvalidValue {
                field: "relative flags",
                value: i32::from(raw),
            });
        }
        Ok(RelativeFlags(raw))
    }

    fn write_to<W: Write>(&self, buf: &mut W) -> Result<(), Error> {
        self.0.write_to(buf)
    }
}

/// Origin, dimensions and cells of one barrier. `cells` holds one bit per
/// cell, x fastest, least significant bit first.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSnapshot {
    pub origin_x: f64,
    pub origin_z: f64,
    pub width: i32,
    pub depth: i32,
    pub height: i32,
    pub cells: ByteArray,
}

impl Serializable for GridSnapshot {
    fn read_from<R: Read>(buf: &mut R) -> Result<GridSnapshot, Error> {
        Ok(GridSnapshot {
            origin_x: f64::read_from(buf)?,
            origin_z: f64::read_from(buf)?,
            width: i32::read_from(buf)?,
            depth: i32::read_from(buf)?,
            height: i32::read_from(buf)?,
            cells: ByteArray::read_from(buf)?,
        })
    }

    fn write_to<W: Write>(&self, buf: &mut W) -> Result<(), Error> {
        self.origin_x.write_to(buf)?;
        self.origin_z.write_to(buf)?;
        self.width.write_to(buf)?;
        self.depth.write_to(buf)?;
        self.height.write_to(buf)?;
        self.cells.write_to(buf)
    }
}

packets! {
    // Clientbound
    Clientbound 0x00 Welcome {
        protocol_version: VarInt,
        compression_threshold: VarInt,
    }
    Clientbound 0x01 SyncBarrierNames {
        names: Vec<String>,
    }
    Clientbound 0x02 SyncBarrier {
        scope: SyncScope,
        name: String,
        snapshot: Option<GridSnapshot>,
    }
    Clientbound 0x03 PositionCorrection {
        x: f64,
        y: f64,
        z: f64,
        reset_velocity: bool,
    }
    Clientbound 0x04 EditFeedback {
        ok: bool,
        message: String,
    }
    Clientbound 0x05 Disconnect {
        reason: String,
    }

    // Serverbound
    Serverbound 0x00 Hello {
        protocol_version: VarInt,
        username: String,
    }
    Serverbound 0x01 PlayerMove {
        x: f64,
        y: f64,
        z: f64,
        on_ground: bool,
    }
    Serverbound 0x02 TeleportRequest {
        x: f64,
        y: f64,
        z: f64,
        relative: RelativeFlags,
    }
    Serverbound 0x03 SetBarrierFocus {
        name: String,
    }
    Serverbound 0x04 SetActiveBarrier {
        name: Option<String>,
    }
    Serverbound 0x05 CreateBarrier {
        name: String,
        origin_x: f64,
        origin_z: f64,
        width: i32,
        depth: i32,
        height: i32,
    }
    Serverbound 0x06 RemoveBarrier {
        name: String,
    }
    Serverbound 0x07 ResizeBarrier {
        target: Option<String>,
        origin_x: f64,
        origin_z: f64,
        width: i32,
        depth: i32,
        height: i32,
    }
    Serverbound 0x08 EditCell {
        target: Option<String>,
        x: i32,
        y: i32,
        z: i32,
        solid: bool,
    }
    Serverbound 0x09 EditColumn {
        target: Option<String>,
        x: i32,
        z: i32,
        solid: bool,
    }
    Serverbound 0x0a EditLine {
        target: Option<String>,
        x1: i32,
        z1: i32,
        x2: i32,
        z2: i32,
        solid: bool,
    }
    Serverbound 0x0b ToolUse {
        eye_x: f64,
        eye_y: f64,
        eye_z: f64,
        look_x: f64,
        look_y: f64,
        look_z: f64,
        action: ToolAction,
    }
    Serverbound 0x0c ClearBarriers {}
}
