use crate::core::io::traits::MolecularFile;
use crate::core::models::atom::Atom;
use crate::core::models::builder::{AssemblyError, StructureAssembler};
use crate::core::models::structure::Structure;
use nalgebra::Point3;
use std::io::{self, BufRead, Write};
use thiserror::Error;

/// Non-coordinate records preserved from the input file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PdbMetadata {
    pub header_lines: Vec<String>,
}

#[derive(Debug, Error)]
pub enum PdbError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse {
        line: usize,
        kind: PdbParseErrorKind,
    },
    #[error("Inconsistent data on line {line}: {source}")]
    Assembly {
        line: usize,
        source: AssemblyError,
    },
    #[error("Missing required record: {0}")]
    MissingRecord(String),
}

#[derive(Debug, Error)]
pub enum PdbParseErrorKind {
    #[error("Invalid integer format in columns {columns} (value: '{value}')")]
    InvalidInt { columns: String, value: String },
    #[error("Invalid float format in columns {columns} (value: '{value}')")]
    InvalidFloat { columns: String, value: String },
    #[error("Required field in columns {columns} is empty")]
    MissingRequiredField { columns: String },
    #[error("Line is too short for ATOM/HETATM record (must be at least 54 chars)")]
    LineTooShort,
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end).unwrap_or("").trim()
}

fn column_char(line: &str, idx: usize) -> Option<char> {
    line.get(idx..idx + 1)
        .and_then(|s| s.chars().next())
        .filter(|c| !c.is_whitespace())
}

fn parse_float(line: &str, line_num: usize, start: usize, end: usize) -> Result<f64, PdbError> {
    let value = slice_and_trim(line, start, end);
    value.parse().map_err(|_| PdbError::Parse {
        line: line_num,
        kind: PdbParseErrorKind::InvalidFloat {
            columns: format!("{}-{}", start + 1, end),
            value: value.into(),
        },
    })
}

fn parse_optional_float(line: &str, start: usize, end: usize, default: f64) -> f64 {
    slice_and_trim(line, start, end).parse().unwrap_or(default)
}

pub struct PdbFile;

impl MolecularFile for PdbFile {
    type Metadata = PdbMetadata;
    type Error = PdbError;

    fn read_from(reader: &mut impl BufRead) -> Result<(Structure, Self::Metadata), Self::Error> {
        let mut assembler = StructureAssembler::new("");
        let mut metadata = PdbMetadata::default();
        let mut structure_id = String::new();
        let mut atom_count = 0usize;

        let mut current_chain_id: Option<char> = None;
        let mut current_residue_key: Option<(isize, Option<char>)> = None;

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;
            let record_type = slice_and_trim(&line, 0, 6);

            match record_type {
                "ATOM" | "HETATM" => {
                    if line.len() < 54 {
                        return Err(PdbError::Parse {
                            line: line_num,
                            kind: PdbParseErrorKind::LineTooShort,
                        });
                    }

                    // Only the first alternate location is kept.
                    if let Some(alt_loc) = column_char(&line, 16) {
                        if alt_loc != 'A' && alt_loc != '1' {
                            continue;
                        }
                    }

                    let serial_str = slice_and_trim(&line, 6, 11);
                    let name_str = slice_and_trim(&line, 12, 16);
                    let res_name_str = slice_and_trim(&line, 17, 20);
                    let chain_id = column_char(&line, 21).unwrap_or('A');
                    let res_seq_str = slice_and_trim(&line, 22, 26);
                    let insertion_code = column_char(&line, 26);

                    if name_str.is_empty() {
                        return Err(PdbError::Parse {
                            line: line_num,
                            kind: PdbParseErrorKind::MissingRequiredField {
                                columns: "13-16".into(),
                            },
                        });
                    }
                    let serial: usize = serial_str.parse().map_err(|_| PdbError::Parse {
                        line: line_num,
                        kind: PdbParseErrorKind::InvalidInt {
                            columns: "7-11".into(),
                            value: serial_str.into(),
                        },
                    })?;
                    let res_seq: isize = res_seq_str.parse().map_err(|_| PdbError::Parse {
                        line: line_num,
                        kind: PdbParseErrorKind::InvalidInt {
                            columns: "23-26".into(),
                            value: res_seq_str.into(),
                        },
                    })?;
                    let x = parse_float(&line, line_num, 30, 38)?;
                    let y = parse_float(&line, line_num, 38, 46)?;
                    let z = parse_float(&line, line_num, 46, 54)?;

                    let mut atom = Atom::new(serial, name_str, Point3::new(x, y, z))
                        .with_element(slice_and_trim(&line, 76, 78));
                    atom.occupancy = parse_optional_float(&line, 54, 60, 1.0);
                    atom.b_factor = parse_optional_float(&line, 60, 66, 0.0);

                    if current_chain_id != Some(chain_id) {
                        assembler.start_chain(chain_id);
                        current_chain_id = Some(chain_id);
                        current_residue_key = None;
                    }
                    let residue_key = (res_seq, insertion_code);
                    if current_residue_key != Some(residue_key) {
                        assembler
                            .start_residue(
                                res_seq,
                                insertion_code,
                                res_name_str,
                                record_type == "HETATM",
                            )
                            .map_err(|source| PdbError::Assembly {
                                line: line_num,
                                source,
                            })?;
                        current_residue_key = Some(residue_key);
                    }
                    assembler
                        .add_atom(atom)
                        .map_err(|source| PdbError::Assembly {
                            line: line_num,
                            source,
                        })?;
                    atom_count += 1;
                }
                "TER" => {
                    current_residue_key = None;
                }
                // Only the first model of an ensemble is read.
                "ENDMDL" | "END" => break,
                "MODEL" | "ANISOU" | "CONECT" | "MASTER" => {}
                _ => {
                    if record_type == "HEADER" && structure_id.is_empty() {
                        structure_id = slice_and_trim(&line, 62, 66).to_string();
                    }
                    if !line.trim().is_empty() {
                        metadata.header_lines.push(line);
                    }
                }
            }
        }

        if atom_count == 0 {
            return Err(PdbError::MissingRecord("ATOM/HETATM records".into()));
        }
        let mut structure = assembler.build();
        structure.id = structure_id;
        Ok((structure, metadata))
    }

    fn write_to(
        structure: &Structure,
        metadata: &Self::Metadata,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error> {
        for line in &metadata.header_lines {
            writeln!(writer, "{}", line)?;
        }

        for chain in structure.chains() {
            for residue in chain.residues() {
                let record_type = if residue.is_hetero { "HETATM" } else { "ATOM" };
                for atom in residue.atoms() {
                    let name_field = if atom.name.len() < 4 {
                        format!(" {:<3}", atom.name)
                    } else {
                        atom.name.clone()
                    };
                    writeln!(
                        writer,
                        "{:<6}{:>5} {:<4} {:>3} {:1}{:>4}{:1}   {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}          {:>2}",
                        record_type,
                        atom.serial,
                        name_field,
                        residue.name,
                        chain.id,
                        residue.number,
                        residue.insertion_code.unwrap_or(' '),
                        atom.position.x,
                        atom.position.y,
                        atom.position.z,
                        atom.occupancy,
                        atom.b_factor,
                        atom.element,
                    )?;
                }
            }
            if !chain.is_empty() {
                writeln!(writer, "TER")?;
            }
        }

        writeln!(writer, "END")?;
        Ok(())
    }
}
