pub mod cad_csv;
