//! Picture-timing information consumed at frame allocation.

use serde::{Deserialize, Serialize};

/// Source scan type of the current picture, from picture-timing SEI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PictureStruct {
    /// Progressive frame.
    #[default]
    Frame,
    /// Top field of an interlaced frame.
    TopField,
    /// Bottom field of an interlaced frame.
    BottomField,
}

/// The slice of picture-timing SEI state the DPB consumes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PictureTiming {
    pub picture_struct: PictureStruct,
}
