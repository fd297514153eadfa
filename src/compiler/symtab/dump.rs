use std::io::Write;

use serde::Serialize;

use super::{symbol::SymbolKind, SymId, Symbol, SymbolTable};

/// How much of the symbol table [`SymbolTable::print`] writes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DumpDetail {
    /// One line per symbol.
    Summary,
    /// The raw string pool, with a marker under the first free byte.
    Pool,
    /// The occupied buckets of the hash table.
    Hash,
    /// Every field of every symbol.
    Long,
    /// Every symbol serialized as a JSON array.
    Json,
}

impl std::str::FromStr for DumpDetail {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "summary" => Ok(DumpDetail::Summary),
            "pool" => Ok(DumpDetail::Pool),
            "hash" => Ok(DumpDetail::Hash),
            "long" => Ok(DumpDetail::Long),
            "json" => Ok(DumpDetail::Json),
            _ => Err(format!("Unknown symbol table detail: {}", s)),
        }
    }
}

#[derive(Serialize)]
struct JsonSymbol<'a> {
    id: SymId,
    name: &'a str,
    #[serde(flatten)]
    symbol: &'a Symbol,
}

impl SymbolTable {
    pub fn print(&self, detail: DumpDetail, out: &mut dyn Write) -> std::io::Result<()> {
        match detail {
            DumpDetail::Summary => self.print_summary(out),
            DumpDetail::Pool => self.print_pool(out),
            DumpDetail::Hash => self.print_hash(out),
            DumpDetail::Long => self.print_long(out),
            DumpDetail::Json => {
                let symbols: Vec<_> = self
                    .iter()
                    .map(|(id, symbol)| JsonSymbol {
                        id,
                        name: self.name(id),
                        symbol,
                    })
                    .collect();
                serde_json::to_writer_pretty(&mut *out, &symbols)?;
                writeln!(out)
            }
        }
    }

    fn print_summary(&self, out: &mut dyn Write) -> std::io::Result<()> {
        writeln!(
            out,
            "{:>5} {:>12} {:>4} {:>5} {:>5} {:>6} {:>12}  {:<13} Extra",
            "Pos", "Name", "Lev", "Hash", "Back", "Offs", "Type", "Tag"
        )?;
        for (id, sym) in self.iter() {
            let hash_link = match sym.hash_link {
                Some(link) => link.to_string(),
                None => "-".into(),
            };
            writeln!(
                out,
                "{:>5} {:>12} {:>4} {:>5} {:>5} {:>6} {:>12}  {:<13} {}",
                id,
                self.name(id),
                sym.level,
                hash_link,
                sym.back_link,
                sym.offset,
                self.name(sym.ty),
                sym.tag().to_string(),
                self.extra(sym)
            )?;
        }
        Ok(())
    }

    fn extra(&self, sym: &Symbol) -> String {
        match &sym.kind {
            SymbolKind::Constant(value) => format!("value: {}", value),
            SymbolKind::Array { cardinality, .. } => format!("card: {}", cardinality),
            SymbolKind::Parameter { size, preceding } => match preceding {
                Some(p) => format!("size: {}, prec: {}", size, self.name(*p)),
                None => format!("size: {}", size),
            },
            SymbolKind::Procedure(r) | SymbolKind::Function(r) => {
                format!("lbl: {}, ar_size: {}", r.label_nr, r.ar_size)
            }
            SymbolKind::Undefined | SymbolKind::NameType | SymbolKind::Variable => String::new(),
        }
    }

    fn print_pool(&self, out: &mut dyn Write) -> std::io::Result<()> {
        let pool = self.pool();
        if pool.position() == 0 {
            return writeln!(out, "(String pool empty)");
        }

        let mut line = String::new();
        for (_, text) in pool.iter() {
            line.push('|');
            line.push_str(text);
        }
        writeln!(out, "{}", line)?;
        writeln!(
            out,
            "{:>width$} (pool_pos = {})",
            "^",
            pool.position(),
            width = line.len() + 1
        )
    }

    fn print_hash(&self, out: &mut dyn Write) -> std::io::Result<()> {
        for (bucket, head) in self.hash_table().iter().enumerate() {
            let mut chain = vec![];
            let mut cur = *head;
            while let Some(id) = cur {
                chain.push(format!("{} ({})", self.name(id), id));
                cur = self.get_symbol(id).ok().and_then(|s| s.hash_link);
            }
            if !chain.is_empty() {
                writeln!(out, "{:>5}: {}", bucket, chain.join(" -> "))?;
            }
        }
        Ok(())
    }

    fn print_long(&self, out: &mut dyn Write) -> std::io::Result<()> {
        for (id, sym) in self.iter() {
            writeln!(out, "{} ({})", self.name(id), id)?;
            writeln!(out, "    tag:       {}", sym.tag())?;
            writeln!(out, "    type:      {}", self.name(sym.ty))?;
            writeln!(out, "    level:     {}", sym.level)?;
            writeln!(out, "    offset:    {}", sym.offset)?;
            writeln!(out, "    bucket:    {}", sym.back_link)?;
            if let Some(link) = sym.hash_link {
                writeln!(out, "    hash link: {}", self.name(link))?;
            }
            if let Some(pos) = sym.pos {
                writeln!(out, "    position:  {}", pos)?;
            }
            let extra = self.extra(sym);
            if !extra.is_empty() {
                writeln!(out, "    {}", extra)?;
            }
        }
        Ok(())
    }
}
