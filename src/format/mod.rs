pub mod ply;
