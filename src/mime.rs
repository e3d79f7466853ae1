//! Content type lookup by file suffix / 根据后缀选择 Content-Type

/// Fallback for unknown suffixes / 未知后缀的默认类型
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Resolve the content type for a suffix (without the dot) / 根据后缀获取 content type
///
/// The fixed table wins; anything it does not know is handed to `mime_guess`.
pub fn select_mime(suffix: &str) -> String {
    let suffix = suffix.trim_start_matches('.').to_ascii_lowercase();
    if let Some(mime) = table_lookup(&suffix) {
        return mime.to_string();
    }
    mime_guess::from_ext(&suffix)
        .first()
        .map(|m| m.to_string())
        .unwrap_or_else(|| OCTET_STREAM.to_string())
}

/// Resolve the content type for a request path / 根据路径获取 content type
pub fn mime_for_path(path: &str) -> String {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(i) => select_mime(&name[i + 1..]),
        None => OCTET_STREAM.to_string(),
    }
}

fn table_lookup(suffix: &str) -> Option<&'static str> {
    let mime = match suffix {
        "ez" => "application/andrew-inset",
        "hqx" => "application/mac-binhex40",
        "cpt" => "application/mac-compactpro",
        "doc" => "application/msword",
        "bin" | "dms" | "lha" | "lzh" | "exe" | "class" | "so" | "dll" => OCTET_STREAM,
        "oda" => "application/oda",
        "pdf" => "application/pdf",
        "ai" | "eps" | "ps" => "application/postscript",
        "smi" | "smil" => "application/smil",
        "mif" => "application/vnd.mif",
        "xls" => "application/vnd.ms-excel",
        "ppt" => "application/vnd.ms-powerpoint",
        "wbxml" => "application/vnd.wap.wbxml",
        "wmlc" => "application/vnd.wap.wmlc",
        "wmlsc" => "application/vnd.wap.wmlscriptc",
        "bcpio" => "application/x-bcpio",
        "vcd" => "application/x-cdlink",
        "pgn" => "application/x-chess-pgn",
        "cpio" => "application/x-cpio",
        "csh" => "application/x-csh",
        "dcr" | "dir" | "dxr" => "application/x-director",
        "dvi" => "application/x-dvi",
        "spl" => "application/x-futuresplash",
        "gtar" => "application/x-gtar",
        "hdf" => "application/x-hdf",
        "js" => "application/x-javascript",
        "skp" | "skd" | "skt" | "skm" => "application/x-koan",
        "latex" => "application/x-latex",
        "nc" | "cdf" => "application/x-netcdf",
        "sh" => "application/x-sh",
        "shar" => "application/x-shar",
        "swf" => "application/x-shockwave-flash",
        "sit" => "application/x-stuffit",
        "sv4cpio" => "application/x-sv4cpio",
        "sv4crc" => "application/x-sv4crc",
        "tar" => "application/x-tar",
        "tcl" => "application/x-tcl",
        "tex" => "application/x-tex",
        "texinfo" | "texi" => "application/x-texinfo",
        "t" | "tr" | "roff" => "application/x-troff",
        "man" => "application/x-troff-man",
        "me" => "application/x-troff-me",
        "ms" => "application/x-troff-ms",
        "ustar" => "application/x-ustar",
        "src" => "application/x-wais-source",
        "xhtml" | "xht" => "application/xhtml+xml",
        "zip" => "application/zip",
        "form" => "application/x-www-form-urlencoded",
        "au" | "snd" => "audio/basic",
        "mid" | "midi" | "kar" => "audio/midi",
        "mpga" | "mp2" | "mp3" => "audio/mpeg",
        "aif" | "aiff" | "aifc" => "audio/x-aiff",
        "m3u" => "audio/x-mpegurl",
        "ram" | "rm" => "audio/x-pn-realaudio",
        "rpm" => "audio/x-pn-realaudio-plugin",
        "ra" => "audio/x-realaudio",
        "wav" => "audio/x-wav",
        "pdb" => "chemical/x-pdb",
        "xyz" => "chemical/x-xyz",
        "bmp" => "image/bmp",
        "gif" => "image/gif",
        "ief" => "image/ief",
        "jpeg" | "jpg" | "jpe" => "image/jpeg",
        "png" => "image/png",
        "tiff" | "tif" => "image/tiff",
        "djvu" | "djv" => "image/vnd.djvu",
        "wbmp" => "image/vnd.wap.wbmp",
        "ras" => "image/x-cmu-raster",
        "pnm" => "image/x-portable-anymap",
        "pbm" => "image/x-portable-bitmap",
        "pgm" => "image/x-portable-graymap",
        "ppm" => "image/x-portable-pixmap",
        "rgb" => "image/x-rgb",
        "xbm" => "image/x-xbitmap",
        "xpm" => "image/x-xpixmap",
        "xwd" => "image/x-xwindowdump",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "igs" | "iges" => "model/iges",
        "msh" | "mesh" | "silo" => "model/mesh",
        "wrl" | "vrml" => "model/vrml",
        "css" => "text/css",
        "html" | "htm" => "text/html",
        "asc" | "txt" => "text/plain",
        "rtx" => "text/richtext",
        "rtf" => "text/rtf",
        "sgml" | "sgm" => "text/sgml",
        "tsv" => "text/tab-separated-values",
        "wml" => "text/vnd.wap.wml",
        "wmls" => "text/vnd.wap.wmlscript",
        "etx" => "text/x-setext",
        "xsl" | "xml" => "text/xml",
        "mpeg" | "mpg" | "mpe" => "video/mpeg",
        "qt" | "mov" => "video/quicktime",
        "mxu" => "video/vnd.mpegurl",
        "avi" => "video/x-msvideo",
        "movie" => "video/x-sgi-movie",
        "ice" => "x-conference/x-cooltalk",
        _ => return None,
    };
    Some(mime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_mime_table() {
        assert_eq!(select_mime("html"), "text/html");
        assert_eq!(select_mime("JS"), "application/x-javascript");
        assert_eq!(select_mime(".svg"), "image/svg+xml");
        assert_eq!(select_mime("exe"), OCTET_STREAM);
    }

    #[test]
    fn test_select_mime_fallback() {
        // not in the fixed table, known to mime_guess
        assert_eq!(select_mime("json"), "application/json");
        assert_eq!(select_mime("no-such-suffix"), OCTET_STREAM);
    }

    #[test]
    fn test_mime_for_path() {
        assert_eq!(mime_for_path("/assets/index.css"), "text/css");
        assert_eq!(mime_for_path("/favicon.ico"), "image/x-icon");
        assert_eq!(mime_for_path("/LICENSE"), OCTET_STREAM);
        assert_eq!(mime_for_path("/dir.v2/README"), OCTET_STREAM);
    }
}
