pub mod opf;
