pub mod actions;
pub mod constants;
pub mod entity;
pub mod game_loop;
pub mod input_buffer;
pub mod render;
pub mod systems;
pub mod world;
