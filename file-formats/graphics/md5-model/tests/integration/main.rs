//! Integration tests for md5-model

mod common;
mod loading;
mod playback;
mod skinning;
