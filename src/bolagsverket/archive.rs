// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ARQUIVO ZIP DA ÅRSREDOVISNING
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// O documento baixado é um zip com um membro `.xhtml` (iXBRL).
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::io::{Cursor, Read};

use zip::ZipArchive;

/// Teto da pré-alocação: o tamanho declarado no zip vem da rede.
const MAX_PREALLOCATED_BYTES: u64 = 64 * 1024 * 1024;

/// Erros ao abrir o zip.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// Zip corrompido ou ilegível.
    #[error("Invalid zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Falha ao ler um membro.
    #[error("I/O error reading archive member: {0}")]
    Io(#[from] std::io::Error),

    /// Nenhum membro `.xhtml` no arquivo.
    #[error("Inga XHTML-filer hittades i zip-arkivet")]
    NoXhtml,
}

/// Membro `.xhtml` extraído.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XhtmlMember {
    /// Nome do membro dentro do zip
    pub name: String,
    /// Conteúdo bruto (UTF-8)
    pub content: Vec<u8>,
}

/// Extrai o primeiro membro cujo nome termina em `.xhtml` (sem diferenciar
/// maiúsculas), na ordem do diretório central.
pub fn extract_xhtml(bytes: &[u8]) -> Result<XhtmlMember, ArchiveError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if !file.is_file() || !file.name().to_lowercase().ends_with(".xhtml") {
            continue;
        }

        let name = file.name().to_string();
        let mut content = Vec::with_capacity(initial_capacity(file.size()));
        file.read_to_end(&mut content)?;

        log::debug!("📦 Membro XHTML: {} ({} bytes)", name, content.len());
        return Ok(XhtmlMember { name, content });
    }

    Err(ArchiveError::NoXhtml)
}

fn initial_capacity(declared_size: u64) -> usize {
    usize::try_from(declared_size.min(MAX_PREALLOCATED_BYTES)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    fn build_zip(members: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, content) in members {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_first_xhtml_member_selected() {
        let bytes = build_zip(&[
            ("meta.json", "{}"),
            ("rapport/5568925548_2022.XHTML", "<html/>"),
            ("other.xhtml", "<p/>"),
        ]);
        let member = extract_xhtml(&bytes).unwrap();
        assert_eq!(member.name, "rapport/5568925548_2022.XHTML");
        assert_eq!(member.content, b"<html/>");
    }

    #[test]
    fn test_no_xhtml_member() {
        let bytes = build_zip(&[("readme.txt", "hej")]);
        assert!(matches!(extract_xhtml(&bytes), Err(ArchiveError::NoXhtml)));
    }

    #[test]
    fn test_preallocation_is_capped() {
        assert_eq!(initial_capacity(7), 7);
        assert_eq!(initial_capacity(u64::MAX), 64 * 1024 * 1024);
    }

    #[test]
    fn test_not_a_zip() {
        assert!(matches!(extract_xhtml(b"not a zip"), Err(ArchiveError::Zip(_))));
    }
}
